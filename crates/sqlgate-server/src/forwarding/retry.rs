//! Caller-side retry with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use super::orchestrator::ForwardResult;
use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Runs `attempt` until it succeeds, fails for a non-retryable reason, or
    /// the attempt budget is spent. The returned result records the count.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> ForwardResult
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ForwardResult>,
    {
        let mut backoff = self.initial_backoff;
        let mut number = 1;
        loop {
            let mut result = attempt(number).await;
            // results that never reached the network keep a zero count
            if result.attempts > 0 {
                result.attempts = number;
            }
            if number >= self.max_attempts || !result.is_retryable() {
                return result;
            }
            tracing::warn!(
                attempt = number,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = result.error.as_deref().unwrap_or(""),
                "forward attempt failed; retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
            number += 1;
        }
    }
}
