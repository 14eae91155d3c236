use crate::engine::{Requester, RequesterError, RequesterFactory};
use crate::http::client::create_client;
use crate::http::request::execute_step;
use crate::types::{ErrorKind, Proxy, RequestError, Step, StepResult};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub struct HttpRequesterFactory;

impl RequesterFactory for HttpRequesterFactory {
    fn new_requester(&self, step: &Step) -> Result<Box<dyn Requester>, RequesterError> {
        let url = Url::parse(&step.target.url).map_err(|e| RequesterError::InvalidUrl {
            url: step.target.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequesterError::UnsupportedScheme(url.scheme().to_string()));
        }

        Ok(Box::new(HttpRequester::new(step.clone())))
    }
}

pub struct HttpRequester {
    step: Step,
    proxy: Proxy,
    cancel_token: CancellationToken,
    debug: bool,
    client: RwLock<Option<Client>>,
}

impl HttpRequester {
    fn new(step: Step) -> Self {
        Self {
            step,
            proxy: Proxy::Direct,
            cancel_token: CancellationToken::new(),
            debug: false,
            client: RwLock::new(None),
        }
    }

    /// Failures of an aborting step become the scenario's stop signal.
    fn finish(&self, mut result: StepResult) -> StepResult {
        if self.step.abort_on_failure {
            if let Some(err) = result.error.as_mut() {
                err.kind = ErrorKind::Intended;
            }
        }
        result
    }
}

#[async_trait]
impl Requester for HttpRequester {
    fn init(
        &mut self,
        cancel_token: CancellationToken,
        step: &Step,
        proxy: &Proxy,
        debug: bool,
    ) -> Result<(), RequesterError> {
        let client = create_client(step.target.timeout, proxy)?;
        self.step = step.clone();
        self.proxy = proxy.clone();
        self.cancel_token = cancel_token;
        self.debug = debug;
        self.client = RwLock::new(Some(client));
        Ok(())
    }

    async fn send(&self) -> StepResult {
        let client = self.client.read().await.clone();
        let Some(client) = client else {
            return StepResult::new(self.step.id, self.step.name.clone()).with_error(
                RequestError::new(ErrorKind::Unknown, "requester is closed"),
            );
        };

        tokio::select! {
            biased;

            _ = self.cancel_token.cancelled() => {
                StepResult::new(self.step.id, self.step.name.clone())
                    .with_error(RequestError::canceled())
            }
            result = execute_step(&client, &self.step, &self.proxy, self.debug) => {
                self.finish(result)
            }
        }
    }

    async fn done(&self) {
        if self.client.write().await.take().is_some() {
            tracing::debug!("Released client for step {} via {}", self.step.id, self.proxy);
        }
    }
}
