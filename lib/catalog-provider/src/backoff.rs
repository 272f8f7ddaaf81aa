//! Exponential backoff with jitter

use crate::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Retry delays doubling from the initial interval up to the maximum.
///
/// Each delay adds up to 10% of jitter on top of its base. There is no
/// attempt ceiling; callers stop retrying through cancellation.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            initial: config.initial_interval,
            max: config.max_interval.max(config.initial_interval),
            current: None,
        }
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let base = match self.current {
            None => self.initial,
            Some(current) => current.saturating_mul(2).min(self.max),
        };
        self.current = Some(base);

        let base_ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
        let jitter = base_ms / 10;
        let add = if jitter > 0 {
            rand::thread_rng().gen_range(0..=jitter)
        } else {
            0
        };

        (base + Duration::from_millis(add)).min(self.max)
    }

    /// Start over from the initial interval
    pub fn reset(&mut self) {
        self.current = None;
    }
}
