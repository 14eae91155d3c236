use crate::engine::requester::{Requester, RequesterError, RequesterFactory};
use crate::engine::sleep::SleepStrategy;
use crate::types::{Proxy, Scenario};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
#[error("failed to build requester for step {step_id} via {proxy}: {source}")]
pub struct PoolError {
    pub step_id: u16,
    pub proxy: Proxy,
    #[source]
    pub source: RequesterError,
}

pub struct PoolEntry {
    pub step_id: u16,
    pub sleeper: Option<SleepStrategy>,
    pub requester: Box<dyn Requester>,
}

/// Index-aligned with `Scenario::steps`.
pub type Requesters = Arc<[PoolEntry]>;

/// One set of step-bound requesters per proxy, built lazily and cached for the
/// proxy's lifetime.
pub struct RequesterPool {
    scenario: Arc<Scenario>,
    factory: Arc<dyn RequesterFactory>,
    cancel_token: CancellationToken,
    debug: bool,
    clients: Mutex<HashMap<Proxy, Requesters>>,
}

impl RequesterPool {
    pub fn new(
        scenario: Arc<Scenario>,
        factory: Arc<dyn RequesterFactory>,
        cancel_token: CancellationToken,
        debug: bool,
    ) -> Self {
        Self {
            scenario,
            factory,
            cancel_token,
            debug,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Eagerly builds requesters for every proxy, failing on the first error.
    pub async fn init(&self, proxies: &[Proxy]) -> Result<(), PoolError> {
        for proxy in proxies {
            self.get_or_create(proxy).await?;
        }
        tracing::info!("Requester pool ready for {} proxies", proxies.len());
        Ok(())
    }

    pub async fn get_or_create(&self, proxy: &Proxy) -> Result<Requesters, PoolError> {
        // Held across the build so concurrent first callers never build twice.
        let mut clients = self.clients.lock().await;

        if let Some(requesters) = clients.get(proxy) {
            return Ok(requesters.clone());
        }

        let requesters = self.build(proxy).await?;
        clients.insert(proxy.clone(), requesters.clone());
        Ok(requesters)
    }

    async fn build(&self, proxy: &Proxy) -> Result<Requesters, PoolError> {
        let mut entries: Vec<PoolEntry> = Vec::with_capacity(self.scenario.steps.len());

        for step in &self.scenario.steps {
            let built = self.factory.new_requester(step).and_then(|mut requester| {
                requester.init(self.cancel_token.clone(), step, proxy, self.debug)?;
                Ok(requester)
            });

            match built {
                Ok(requester) => entries.push(PoolEntry {
                    step_id: step.id,
                    sleeper: SleepStrategy::from_spec(&step.sleep),
                    requester,
                }),
                Err(source) => {
                    tracing::warn!(
                        "Requester build failed for step {} via {}: {}",
                        step.id,
                        proxy,
                        source
                    );
                    for entry in &entries {
                        entry.requester.done().await;
                    }
                    return Err(PoolError {
                        step_id: step.id,
                        proxy: proxy.clone(),
                        source,
                    });
                }
            }
        }

        tracing::debug!("Built {} requesters for proxy {}", entries.len(), proxy);
        Ok(entries.into())
    }

    pub async fn close_all(&self) {
        let clients = self.clients.lock().await;
        for requesters in clients.values() {
            for entry in requesters.iter() {
                entry.requester.done().await;
            }
        }
        tracing::debug!("Closed requesters for {} proxies", clients.len());
    }

    #[cfg(test)]
    pub async fn proxy_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}
