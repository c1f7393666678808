use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::fmt;

/// Terminal result of one step execution, driving the acknowledgement
/// decision for the backing queue message.
///
/// - Success: acknowledge
/// - RetryableFailure: leave unacknowledged; the transport redelivers
/// - PermanentFailure: acknowledge; retrying would repeat the same failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        output: Value,
    },
    RetryableFailure {
        reason: String,
    },
    PermanentFailure {
        reason: String,
    },
}

impl ExecutionOutcome {
    pub fn success(output: Value) -> Self {
        Self::Success { output }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::RetryableFailure {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// True only for failures the transport should redeliver.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableFailure { .. })
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success { .. } => write!(f, "success"),
            ExecutionOutcome::RetryableFailure { reason } => {
                write!(f, "retryable failure: {reason}")
            }
            ExecutionOutcome::PermanentFailure { reason } => {
                write!(f, "permanent failure: {reason}")
            }
        }
    }
}
