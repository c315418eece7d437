use async_trait::async_trait;
use std::time::Duration;

/// Source of the delay between fetch attempts.
///
/// Tests swap in an implementation that returns immediately so retry
/// schedules can be checked without waiting on the wall clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time delay on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub retry_ceiling: u32,
    /// Delay before each retry. Does not grow.
    pub retry_interval: Duration,
}

impl RetryPolicy {
    pub fn new(retry_ceiling: u32, retry_interval: Duration) -> Self {
        Self {
            retry_ceiling,
            retry_interval,
        }
    }

    /// Attempts made before giving up, counting the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry_ceiling.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000))
    }
}

impl From<&crate::core::config::ProviderConfig> for RetryPolicy {
    fn from(config: &crate::core::config::ProviderConfig) -> Self {
        Self::new(config.retry_ceiling, config.retry_interval())
    }
}
