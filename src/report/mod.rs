mod aggregate;
mod debug;
mod stdout;

pub use aggregate::AggregatedResult;
pub use stdout::{DEFAULT_LIVE_INTERVAL, ReportMode, Reporter, Sink};
