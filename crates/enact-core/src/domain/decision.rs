//! Decision model: what to do after a delivery attempt.
//!
//! This module defines the Decision type (retry or stop) and the
//! DefaultDecider that derives it from an Outcome and the attempt counter.

use std::time::Duration;

use super::retry::RetryPolicy;
use super::status::{FailureDetail, TerminalStatus};
use super::Outcome;
use crate::ports::Decider;

/// The next action to take for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Try again after `after`.
    Retry { after: Duration, reason: String },

    /// Give up or finish, and commit this status.
    Stop(TerminalStatus),
}

/// Default decider provided by enact-core.
///
/// - `Success` stops with success.
/// - `TerminalFailure` stops immediately as rejected.
/// - `RetryableFailure` retries while `attempt < max_attempts`, then stops
///   as exhausted.
///
/// Pure: no side effects, no state. The dispatcher owns the counter.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, outcome: &Outcome, attempt: u32) -> Decision {
        match outcome {
            Outcome::Success => Decision::Stop(TerminalStatus::Success),
            Outcome::TerminalFailure(reason) => {
                Decision::Stop(TerminalStatus::Failed(FailureDetail::Rejected {
                    message: reason.clone(),
                }))
            }
            Outcome::RetryableFailure(reason) if attempt < self.retry_policy.max_attempts => {
                Decision::Retry {
                    after: self.retry_policy.delay_for(attempt),
                    reason: reason.clone(),
                }
            }
            Outcome::RetryableFailure(reason) => {
                Decision::Stop(TerminalStatus::Failed(FailureDetail::Exhausted {
                    attempts: attempt,
                    last_error: reason.clone(),
                }))
            }
        }
    }

    fn max_attempts(&self) -> u32 {
        self.retry_policy.max_attempts
    }
}
