use crate::types::{Proxy, Step, StepResult};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RequesterError {
    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Performs one scenario step against one proxy.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Binds the requester to its step and proxy. Called once, before any `send`.
    fn init(
        &mut self,
        cancel_token: CancellationToken,
        step: &Step,
        proxy: &Proxy,
        debug: bool,
    ) -> Result<(), RequesterError>;

    /// Executes the step. Failures are reported through `StepResult::error`.
    async fn send(&self) -> StepResult;

    /// Releases transport resources. Safe to call more than once.
    async fn done(&self);
}

pub trait RequesterFactory: Send + Sync {
    fn new_requester(&self, step: &Step) -> Result<Box<dyn Requester>, RequesterError>;
}
