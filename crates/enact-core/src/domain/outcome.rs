//! Outcome model: the classified result of one delivery attempt.
//!
//! Outcomes are never persisted on their own. They are folded into retry
//! decisions and, eventually, into a single `TerminalStatus`.

use serde::{Deserialize, Serialize};

/// Result of exactly one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The worker accepted the task.
    Success,

    /// Transient condition (overload, transport error, timeout, unknown status).
    RetryableFailure(String),

    /// The worker rejected the request permanently.
    TerminalFailure(String),
}

impl Outcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::RetryableFailure(reason.into())
    }

    pub fn terminal(reason: impl Into<String>) -> Self {
        Self::TerminalFailure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::RetryableFailure(reason) | Self::TerminalFailure(reason) => Some(reason),
        }
    }
}
