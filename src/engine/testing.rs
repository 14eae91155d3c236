//! Scripted requesters for exercising the pool and engine without a network.

use crate::engine::requester::{Requester, RequesterError, RequesterFactory};
use crate::types::{
    DurationPhase, ErrorKind, Proxy, RequestError, Scenario, Step, StepResult, Target,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn scenario(steps: &[(u16, &str)]) -> Scenario {
    Scenario {
        steps: steps
            .iter()
            .map(|(id, sleep)| Step {
                id: *id,
                name: format!("step-{}", id),
                target: Target {
                    url: format!("http://localhost/{}", id),
                    method: reqwest::Method::GET,
                    headers: Vec::new(),
                    body: None,
                    timeout: Duration::from_secs(1),
                },
                sleep: sleep.to_string(),
                abort_on_failure: false,
            })
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Success { status: u16, total: f64 },
    Failure { kind: ErrorKind, reason: &'static str },
}

impl Outcome {
    pub fn ok() -> Self {
        Outcome::Success {
            status: 200,
            total: 0.01,
        }
    }

    pub fn fail(kind: ErrorKind, reason: &'static str) -> Self {
        Outcome::Failure { kind, reason }
    }
}

#[derive(Default)]
pub struct ScriptedFactory {
    script: HashMap<u16, Vec<Outcome>>,
    fail_init_at: Option<u16>,
    constructed: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<u16>>>,
}

impl ScriptedFactory {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_init_at(step_id: u16) -> Self {
        Self {
            fail_init_at: Some(step_id),
            ..Self::default()
        }
    }

    /// Outcomes are replayed in order per step, cycling once exhausted.
    pub fn scripted(script: &[(u16, Vec<Outcome>)]) -> Self {
        Self {
            script: script.iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Step ids in the order their requests were sent.
    pub fn sent(&self) -> Vec<u16> {
        self.sent.lock().unwrap().clone()
    }
}

impl RequesterFactory for ScriptedFactory {
    fn new_requester(&self, step: &Step) -> Result<Box<dyn Requester>, RequesterError> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedRequester {
            step_id: step.id,
            name: step.name.clone(),
            outcomes: self.script.get(&step.id).cloned().unwrap_or_default(),
            cursor: AtomicUsize::new(0),
            fail_init: self.fail_init_at == Some(step.id),
            closed: AtomicBool::new(false),
            closed_count: self.closed.clone(),
            sent: self.sent.clone(),
        }))
    }
}

struct ScriptedRequester {
    step_id: u16,
    name: String,
    outcomes: Vec<Outcome>,
    cursor: AtomicUsize,
    fail_init: bool,
    closed: AtomicBool,
    closed_count: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<u16>>>,
}

#[async_trait]
impl Requester for ScriptedRequester {
    fn init(
        &mut self,
        _cancel_token: CancellationToken,
        step: &Step,
        _proxy: &Proxy,
        _debug: bool,
    ) -> Result<(), RequesterError> {
        if self.fail_init {
            return Err(RequesterError::InvalidUrl {
                url: step.target.url.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn send(&self) -> StepResult {
        self.sent.lock().unwrap().push(self.step_id);

        let outcome = if self.outcomes.is_empty() {
            Outcome::ok()
        } else {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.outcomes[i % self.outcomes.len()].clone()
        };

        let result = StepResult::new(self.step_id, self.name.clone());
        match outcome {
            Outcome::Success { status, total } => result
                .with_status(status)
                .with_duration(DurationPhase::Total, total),
            Outcome::Failure { kind, reason } => result.with_error(RequestError::new(kind, reason)),
        }
    }

    async fn done(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closed_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
