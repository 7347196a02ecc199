//! Dispatcher - 1 task の配送ループ
//!
//! # フロー
//! 1. DeliveryClient::attempt() で 1 回配送 → Outcome
//! 2. Decider::decide() → Decision
//! 3. Retry なら backoff だけ待って 1 に戻る
//! 4. Stop なら StatusStore::upsert() で終端ステータスを 1 回だけ書く
//!
//! 配送失敗はループの中で完結し、外には出ない。
//! ingress には何も返さない（結果は StatusStore とログでのみ観測できる）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::domain::{
    Decision, DispatchState, FailureDetail, StatusRecord, Task, TaskId, TerminalStatus,
};
use crate::ports::{Clock, Decider, DeliveryClient, StatusStore, UpsertOutcome};

/// Local retry of the store write alone (the delivery is never repeated for it).
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// A terminal outcome the store would not take.
///
/// Sent on the optional failure channel so it can be replayed or alerted on.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFailure {
    pub record: StatusRecord,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitResult {
    Created,
    /// Another dispatch of the same id committed first.
    AlreadyRecorded,
    Failed(String),
}

/// What one dispatch did, for the worker that ran it.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub task_id: TaskId,
    pub attempts: u32,
    /// Backoff waited before each retry, in order.
    pub delays: Vec<Duration>,
    pub status: TerminalStatus,
    pub commit: CommitResult,
    pub state: DispatchState,
}

/// Owns the attempt/retry/commit lifecycle of a task.
///
/// Built with `DispatcherBuilder`; all collaborators are injected.
pub struct Dispatcher {
    client: Arc<dyn DeliveryClient>,
    decider: Arc<dyn Decider>,
    store: Arc<dyn StatusStore>,
    clock: Arc<dyn Clock>,
    commit_policy: CommitPolicy,
    failures: Option<mpsc::Sender<CommitFailure>>,
}

impl Dispatcher {
    pub(crate) fn new(
        client: Arc<dyn DeliveryClient>,
        decider: Arc<dyn Decider>,
        store: Arc<dyn StatusStore>,
        clock: Arc<dyn Clock>,
        commit_policy: CommitPolicy,
        failures: Option<mpsc::Sender<CommitFailure>>,
    ) -> Self {
        Self {
            client,
            decider,
            store,
            clock,
            commit_policy,
            failures,
        }
    }

    /// Run the full lifecycle of `task` and commit its terminal status.
    pub async fn dispatch(&self, task: Task) -> DispatchReport {
        let span = info_span!("dispatch", task_id = %task.id());
        self.run(task).instrument(span).await
    }

    async fn run(&self, task: Task) -> DispatchReport {
        let mut state = DispatchState::Pending;
        debug!("dispatch started");

        let (status, attempts, delays) = self.deliver(&task, &mut state).await;

        advance(&mut state, DispatchState::Committing);
        let record = StatusRecord::new(task.id().clone(), status.clone(), attempts, self.clock.now());
        let commit = self.commit(record).await;
        advance(&mut state, DispatchState::Committed);

        match status.detail() {
            None => info!(attempts, "task delivered"),
            Some(detail) => warn!(attempts, %detail, "task failed"),
        }

        DispatchReport {
            task_id: task.id().clone(),
            attempts,
            delays,
            status,
            commit,
            state,
        }
    }

    async fn deliver(
        &self,
        task: &Task,
        state: &mut DispatchState,
    ) -> (TerminalStatus, u32, Vec<Duration>) {
        let max_attempts = self.decider.max_attempts().max(1);
        let mut delays = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            advance(state, DispatchState::Attempting);

            let outcome = match self.client.attempt(task).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(attempt, error = %err, "could not build delivery request");
                    let status = TerminalStatus::Failed(FailureDetail::LocalFault {
                        message: err.to_string(),
                    });
                    return (status, attempt, delays);
                }
            };

            match self.decider.decide(&outcome, attempt) {
                Decision::Stop(status) => return (status, attempt, delays),
                Decision::Retry { reason, .. } if attempt >= max_attempts => {
                    warn!(attempt, max_attempts, "retry requested past the attempt budget");
                    let status = TerminalStatus::Failed(FailureDetail::Exhausted {
                        attempts: attempt,
                        last_error: reason,
                    });
                    return (status, attempt, delays);
                }
                Decision::Retry { after, reason } => {
                    warn!(
                        attempt,
                        delay_ms = after.as_millis() as u64,
                        %reason,
                        "retryable delivery failure"
                    );
                    tokio::time::sleep(after).await;
                    delays.push(after);
                }
            }
        }
    }

    async fn commit(&self, record: StatusRecord) -> CommitResult {
        let max_tries = self.commit_policy.max_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;
            match self.store.upsert(record.clone()).await {
                Ok(UpsertOutcome::Created) => return CommitResult::Created,
                Ok(UpsertOutcome::AlreadyRecorded(existing)) => {
                    info!(existing = ?existing.kind, "terminal status already recorded, keeping the first");
                    return CommitResult::AlreadyRecorded;
                }
                Err(err) if tries < max_tries => {
                    warn!(commit_try = tries, error = %err, "status commit failed, retrying");
                    tokio::time::sleep(self.commit_policy.delay).await;
                }
                Err(err) => {
                    let error = err.to_string();
                    error!(
                        tries,
                        error = %error,
                        record = ?record,
                        "status commit failed, terminal outcome not persisted"
                    );
                    self.report_commit_failure(record, error.clone());
                    return CommitResult::Failed(error);
                }
            }
        }
    }

    fn report_commit_failure(&self, record: StatusRecord, error: String) {
        let Some(failures) = &self.failures else {
            return;
        };
        if let Err(e) = failures.try_send(CommitFailure { record, error }) {
            error!(reason = %e, "commit failure channel unavailable");
        }
    }
}

fn advance(state: &mut DispatchState, next: DispatchState) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    trace!(from = ?*state, to = ?next, "dispatch state");
    *state = next;
}
