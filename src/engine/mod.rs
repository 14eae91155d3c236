mod pool;
mod requester;
mod runner;
mod scenario;
mod sleep;
#[cfg(test)]
mod testing;
mod worker;

pub use requester::{Requester, RequesterError, RequesterFactory};
pub use runner::LoadTest;
pub use scenario::ScenarioEngine;
