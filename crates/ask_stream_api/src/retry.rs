use std::time::Duration;

/// Retry attempts allowed after the initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Fixed delay between attempts.
pub const BACKOFF_MS: u64 = 1000;

/// Bounded fixed-backoff retry policy for opening the answer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: Duration::from_millis(BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Total number of network attempts this policy permits.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt may follow the zero-based `attempt` that just failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before the attempt following `attempt`. Backoff is fixed.
    pub fn delay(&self, _attempt: u32) -> Duration {
        self.backoff
    }
}
