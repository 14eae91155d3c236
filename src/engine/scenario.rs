use crate::engine::pool::{PoolError, RequesterPool};
use crate::engine::requester::RequesterFactory;
use crate::types::{ErrorKind, Proxy, RequestError, Scenario, ScenarioResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one run: the (possibly truncated) result and the last recorded error.
pub type RunOutcome = Result<(ScenarioResult, Option<RequestError>), RequestError>;

/// Drives one pass through the scenario's steps for a given proxy.
pub struct ScenarioEngine {
    scenario: Arc<Scenario>,
    pool: RequesterPool,
    cancel_token: CancellationToken,
}

impl ScenarioEngine {
    /// Builds requesters for every proxy up front. Any failure here is a
    /// configuration error and no traffic should be generated.
    pub async fn init(
        scenario: Arc<Scenario>,
        proxies: &[Proxy],
        factory: Arc<dyn RequesterFactory>,
        cancel_token: CancellationToken,
        debug: bool,
    ) -> Result<Self, PoolError> {
        let pool = RequesterPool::new(scenario.clone(), factory, cancel_token.clone(), debug);
        pool.init(proxies).await?;
        Ok(Self {
            scenario,
            pool,
            cancel_token,
        })
    }

    pub async fn run(&self, proxy: &Proxy, start_time: DateTime<Utc>) -> RunOutcome {
        let requesters = self
            .pool
            .get_or_create(proxy)
            .await
            .map_err(|e| RequestError::new(ErrorKind::Unknown, e.to_string()))?;

        let mut result = ScenarioResult::new(proxy.clone(), start_time);
        let mut last_error = None;
        let multi_step = self.scenario.steps.len() > 1;

        for (i, entry) in requesters.iter().enumerate() {
            let step_result = entry.requester.send().await;

            let stop = match step_result.error_kind() {
                Some(ErrorKind::Intended) => {
                    last_error = step_result.error.clone();
                    true
                }
                Some(ErrorKind::Proxy) => {
                    last_error = step_result.error.clone();
                    false
                }
                Some(ErrorKind::Conn | ErrorKind::InvalidRequest | ErrorKind::Unknown) | None => {
                    false
                }
            };

            result.step_results.push(step_result);

            if stop {
                tracing::debug!(
                    "Run via {} stopped at step {} ({} of {})",
                    proxy,
                    entry.step_id,
                    i + 1,
                    requesters.len()
                );
                break;
            }

            let is_last = i + 1 == requesters.len();
            if let Some(sleeper) = &entry.sleeper {
                if multi_step && !is_last {
                    tokio::select! {
                        _ = sleeper.sleep() => {}
                        _ = self.cancel_token.cancelled() => {
                            last_error = Some(RequestError::canceled());
                            break;
                        }
                    }
                }
            }
        }

        Ok((result, last_error))
    }

    pub async fn shutdown(&self) {
        self.pool.close_all().await;
        tracing::info!("Scenario engine shut down");
    }
}
