use crate::engine::ScenarioEngine;
use crate::engine::requester::RequesterFactory;
use crate::engine::worker::{IterationBudget, Worker};
use crate::report::{AggregatedResult, ReportMode, Reporter, Sink};
use crate::types::{LoadConfig, ScenarioResult};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const RESULT_CHANNEL_SIZE: usize = 10_000;

/// Drives the scenario with a fixed set of workers and streams their results
/// into the reporter.
pub struct LoadTest {
    config: LoadConfig,
    factory: Arc<dyn RequesterFactory>,
    cancel_token: CancellationToken,
}

impl LoadTest {
    pub fn new(config: LoadConfig, factory: Arc<dyn RequesterFactory>) -> Self {
        Self {
            config,
            factory,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Runs to completion and returns the aggregated result. Fails before any
    /// traffic is sent if a step's requester cannot be built.
    pub async fn run(self, out: Sink) -> Result<Arc<Mutex<AggregatedResult>>, String> {
        if self.config.proxies.is_empty() {
            return Err("At least one proxy (or direct) is required".to_string());
        }

        let scenario = Arc::new(self.config.scenario.clone());
        let engine = ScenarioEngine::init(
            scenario,
            &self.config.proxies,
            self.factory.clone(),
            self.cancel_token.clone(),
            self.config.debug,
        )
        .await
        .map_err(|e| format!("Failed to initialize scenario: {}", e))?;
        let engine = Arc::new(engine);

        let (reporter, done) = Reporter::new(report_mode(&self.config), out);
        let aggregated = reporter.result();
        let (result_tx, result_rx) = mpsc::channel::<ScenarioResult>(RESULT_CHANNEL_SIZE);
        let reporter_handle = tokio::spawn(reporter.start(result_rx));

        let budget = IterationBudget::new(self.config.iterations);
        let mut worker_handles = Vec::with_capacity(self.config.concurrency as usize);

        for id in 0..self.config.concurrency {
            let proxy = self.config.proxies[id as usize % self.config.proxies.len()].clone();
            let worker = Worker::new(
                id,
                engine.clone(),
                proxy,
                result_tx.clone(),
                self.cancel_token.clone(),
                budget.clone(),
            );
            worker_handles.push(tokio::spawn(worker.run()));
        }

        drop(result_tx);

        if let Some(duration) = self.config.duration {
            let deadline_token = self.cancel_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep(duration) => {
                        tracing::info!("Duration elapsed, stopping workers");
                        deadline_token.cancel();
                    }
                    _ = deadline_token.cancelled() => {}
                }
            });
        }

        for handle in worker_handles {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task failed: {}", e);
            }
        }
        tracing::info!("All workers finished");

        // Stops the deadline task once the run ended on its own.
        self.cancel_token.cancel();

        done.await
            .map_err(|_| "Reporter stopped before finishing the report".to_string())?;
        reporter_handle
            .await
            .map_err(|e| format!("Reporter task failed: {}", e))?;

        engine.shutdown().await;

        Ok(aggregated)
    }
}

pub fn report_mode(config: &LoadConfig) -> ReportMode {
    if config.debug {
        ReportMode::Debug
    } else {
        ReportMode::Stream {
            live_interval: config.live_interval,
        }
    }
}
