mod client;
mod request;
mod requester;

pub use requester::HttpRequesterFactory;
