use crate::types::{DurationPhase, ScenarioResult};
use std::collections::{BTreeMap, HashMap};

/// Incremental mean; avoids accumulating an unbounded sum over long runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    pub avg: f64,
    pub count: u64,
}

impl RunningAverage {
    pub fn add(&mut self, sample: f64) {
        self.count += 1;
        self.avg += (sample - self.avg) / self.count as f64;
    }
}

/// Truncated integer share of successes; 0 when there is nothing to divide.
fn success_percentage(success: u64, failed: u64) -> u64 {
    let total = success + failed;
    if total == 0 {
        return 0;
    }
    success * 100 / total
}

fn failed_percentage(success: u64, failed: u64) -> u64 {
    if success + failed == 0 {
        return 0;
    }
    100 - success_percentage(success, failed)
}

#[derive(Debug, Clone, Default)]
pub struct StepSummary {
    pub name: String,
    pub success_count: u64,
    pub failed_count: u64,
    /// Averaged over successful samples that reported the phase.
    pub durations: BTreeMap<DurationPhase, RunningAverage>,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: HashMap<String, u64>,
}

impl StepSummary {
    pub fn success_percentage(&self) -> u64 {
        success_percentage(self.success_count, self.failed_count)
    }

    pub fn failed_percentage(&self) -> u64 {
        failed_percentage(self.success_count, self.failed_count)
    }

    #[cfg(test)]
    pub fn avg(&self, phase: DurationPhase) -> Option<f64> {
        self.durations.get(&phase).map(|d| d.avg)
    }

    /// Errors by count descending, then reason.
    pub fn sorted_errors(&self) -> Vec<(&str, u64)> {
        let mut errors: Vec<(&str, u64)> = self
            .errors
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        errors
    }
}

/// Running statistics for one load test. Overall counters are per run: a run
/// succeeds only if every one of its steps did.
#[derive(Debug, Clone, Default)]
pub struct AggregatedResult {
    pub success_count: u64,
    pub failed_count: u64,
    /// Mean scenario duration (sum of step totals) over successful runs.
    pub avg_duration: f64,
    pub steps: HashMap<u16, StepSummary>,
}

impl AggregatedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, incoming: &ScenarioResult) {
        let mut scenario_duration = 0.0;

        for step_result in &incoming.step_results {
            let summary = self.steps.entry(step_result.step_id).or_default();
            if summary.name.is_empty() {
                summary.name = step_result.name.clone();
            }

            if let Some(status) = step_result.status {
                *summary.status_codes.entry(status).or_insert(0) += 1;
            }

            if step_result.is_success() {
                summary.success_count += 1;
                for (phase, secs) in &step_result.durations {
                    summary.durations.entry(*phase).or_default().add(*secs);
                }
                scenario_duration += step_result.total_duration();
            } else {
                summary.failed_count += 1;
                *summary
                    .errors
                    .entry(step_result.error_reason().to_string())
                    .or_insert(0) += 1;
            }
        }

        if incoming.is_success() {
            self.success_count += 1;
            self.avg_duration +=
                (scenario_duration - self.avg_duration) / self.success_count as f64;
        } else {
            self.failed_count += 1;
        }
    }

    pub fn success_percentage(&self) -> u64 {
        success_percentage(self.success_count, self.failed_count)
    }

    pub fn failed_percentage(&self) -> u64 {
        failed_percentage(self.success_count, self.failed_count)
    }

    /// Step summaries in ascending step id order.
    pub fn sorted_steps(&self) -> Vec<(u16, &StepSummary)> {
        let mut ids: Vec<u16> = self.steps.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.steps.get(&id).map(|s| (id, s)))
            .collect()
    }
}
