use crate::engine::ScenarioEngine;
use crate::types::{ErrorKind, Proxy, ScenarioResult};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared run counter across workers; a limit of 0 never runs out.
pub struct IterationBudget {
    limit: u64,
    taken: AtomicU64,
}

impl IterationBudget {
    pub fn new(limit: u64) -> Arc<Self> {
        Arc::new(Self {
            limit,
            taken: AtomicU64::new(0),
        })
    }

    pub fn try_take(&self) -> bool {
        if self.limit == 0 {
            return true;
        }
        self.taken
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }
}

pub struct Worker {
    id: u32,
    engine: Arc<ScenarioEngine>,
    proxy: Proxy,
    result_tx: mpsc::Sender<ScenarioResult>,
    cancel_token: CancellationToken,
    budget: Arc<IterationBudget>,
}

impl Worker {
    pub fn new(
        id: u32,
        engine: Arc<ScenarioEngine>,
        proxy: Proxy,
        result_tx: mpsc::Sender<ScenarioResult>,
        cancel_token: CancellationToken,
        budget: Arc<IterationBudget>,
    ) -> Self {
        Self {
            id,
            engine,
            proxy,
            result_tx,
            cancel_token,
            budget,
        }
    }

    pub async fn run(self) {
        tracing::debug!("Worker {} started via {}", self.id, self.proxy);

        loop {
            if self.cancel_token.is_cancelled() || !self.budget.try_take() {
                break;
            }

            let (result, err) = match self.engine.run(&self.proxy, Utc::now()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        "Worker {} retiring, cannot run via {}: {}",
                        self.id,
                        self.proxy,
                        e
                    );
                    break;
                }
            };

            match err.map(|e| e.kind) {
                // Runs cut short by shutdown would skew the report.
                Some(ErrorKind::Intended) if self.cancel_token.is_cancelled() => break,
                Some(ErrorKind::Proxy) => {
                    tracing::debug!("Worker {} saw a proxy error via {}", self.id, self.proxy);
                }
                _ => {}
            }

            if self.result_tx.send(result).await.is_err() {
                break;
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
    }
}
