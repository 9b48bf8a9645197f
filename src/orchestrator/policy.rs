use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ProviderError;

/// How to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Failover,
    Fail,
}

/// Retry / failover rules for one invocation.
///
/// - Only `RateLimited` is retried against the same provider, with exponential backoff.
/// - `RateLimited` (after retries) and `Transient` may fail over when allowed.
/// - Everything else fails immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPolicy {
    retry: RetryConfig,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl FailoverPolicy {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }

    /// Decide what to do next.
    ///
    /// - `attempt` is 0-based (first failure => attempt=0).
    /// - `can_failover` is true only in auto mode with a usable secondary.
    pub fn decide(&self, err: &ProviderError, attempt: u32, can_failover: bool) -> Decision {
        if err.class.is_retryable() && attempt < self.retry.max_retries {
            return Decision::Retry {
                delay: self.retry.backoff(attempt),
            };
        }
        if err.class.is_failover_candidate() && can_failover {
            return Decision::Failover;
        }
        Decision::Fail
    }
}
