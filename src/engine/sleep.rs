use rand::Rng;
use std::time::Duration;

/// Delay policy applied between scenario steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStrategy {
    Fixed(Duration),
    /// Uniform over `[min_ms, max_ms]`, inclusive.
    Range { min_ms: u64, max_ms: u64 },
}

impl SleepStrategy {
    pub fn fixed(ms: u64) -> Self {
        SleepStrategy::Fixed(Duration::from_millis(ms))
    }

    pub fn range(min_ms: u64, max_ms: u64) -> Self {
        let (min_ms, max_ms) = if min_ms > max_ms {
            (max_ms, min_ms)
        } else {
            (min_ms, max_ms)
        };
        SleepStrategy::Range { min_ms, max_ms }
    }

    /// Builds the strategy for a step's sleep spec. Specs are validated when the
    /// scenario is loaded, so unparsable numbers fall back to zero.
    pub fn from_spec(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }

        let strategy = match spec.split_once('-') {
            Some((min, max)) if !max.contains('-') => {
                SleepStrategy::range(parse_ms(min), parse_ms(max))
            }
            _ => SleepStrategy::fixed(parse_ms(spec)),
        };
        Some(strategy)
    }

    pub fn next_duration(&self) -> Duration {
        match *self {
            SleepStrategy::Fixed(duration) => duration,
            SleepStrategy::Range { min_ms, max_ms } => {
                Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
            }
        }
    }

    /// Suspends only the calling task.
    pub async fn sleep(&self) {
        tokio::time::sleep(self.next_duration()).await;
    }
}

fn parse_ms(s: &str) -> u64 {
    s.trim().parse().unwrap_or(0)
}
