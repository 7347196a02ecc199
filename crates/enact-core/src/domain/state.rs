//! State - 1 回の dispatch 内での状態遷移
//!
//! # 状態遷移
//! - Pending -> Attempting
//! - Attempting -> Attempting（retry）
//! - Attempting -> Committing
//! - Committing -> Committed
//!
//! Committed は終端。そこから出る遷移はない。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchState {
    /// Handed to a worker, no attempt made yet.
    Pending,

    /// A delivery attempt is running (or waiting out its backoff).
    Attempting,

    /// A terminal outcome is known and being written to the store.
    Committing,

    /// The store call finished; nothing further happens for this task.
    Committed,
}

impl DispatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed)
    }

    pub fn can_transition_to(self, next: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (self, next),
            (Pending, Attempting)
                | (Attempting, Attempting)
                | (Attempting, Committing)
                | (Committing, Committed)
        )
    }
}
