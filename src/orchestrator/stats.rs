use std::time::Duration;

use crate::types::{OperationKind, Provider};

/// What happened during one orchestrated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStats {
    /// Correlation id, also logged on every event of the call.
    pub request_id: String,
    pub operation: OperationKind,
    /// Provider of each attempt, in order.
    pub attempts: Vec<Provider>,
    /// Backoff delays slept between primary attempts.
    pub backoffs: Vec<Duration>,
    pub failed_over: bool,
    pub elapsed: Duration,
}

impl CallStats {
    pub fn new(operation: OperationKind) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
            attempts: Vec::new(),
            backoffs: Vec::new(),
            failed_over: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn retries(&self) -> u32 {
        self.backoffs.len() as u32
    }

    /// Provider of the last attempt, if any attempt was made.
    pub fn final_provider(&self) -> Option<Provider> {
        self.attempts.last().copied()
    }

    pub fn calls_to(&self, provider: Provider) -> usize {
        self.attempts.iter().filter(|p| **p == provider).count()
    }
}
