//! Terminal status of a dispatch and the record the StatusStore keeps for it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Kind of a terminal status, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Success,
    Failed,
}

/// Why a dispatch ended in `Failed`.
///
/// Budget exhaustion and a worker-reported rejection are kept apart so an
/// operator can tell "the worker said no" from "we gave up".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureDetail {
    /// The worker classified the request as permanently invalid.
    Rejected { message: String },

    /// Every allowed attempt ended in a retryable failure.
    Exhausted { attempts: u32, last_error: String },

    /// The task could not be turned into a request at all.
    LocalFault { message: String },
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { message } => write!(f, "rejected by worker: {message}"),
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(f, "retry budget exhausted after {attempts} attempts: {last_error}"),
            Self::LocalFault { message } => write!(f, "local fault: {message}"),
        }
    }
}

/// Final outcome of one dispatch, before it is stamped into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Success,
    Failed(FailureDetail),
}

impl TerminalStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Success => StatusKind::Success,
            Self::Failed(_) => StatusKind::Failed,
        }
    }

    pub fn detail(&self) -> Option<&FailureDetail> {
        match self {
            Self::Success => None,
            Self::Failed(detail) => Some(detail),
        }
    }
}

/// Persisted terminal status of a task, keyed by `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub task_id: TaskId,
    pub kind: StatusKind,

    /// Present only when `kind` is `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<FailureDetail>,

    /// Delivery attempts made before reaching this status.
    pub attempts: u32,

    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(
        task_id: TaskId,
        status: TerminalStatus,
        attempts: u32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let kind = status.kind();
        let detail = match status {
            TerminalStatus::Success => None,
            TerminalStatus::Failed(detail) => Some(detail),
        };
        Self {
            task_id,
            kind,
            detail,
            attempts,
            updated_at,
        }
    }
}
