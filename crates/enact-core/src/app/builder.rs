//! DispatcherBuilder - Dispatcher の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - DeliveryClient と StatusStore は必須。無ければ build() が失敗する
//! - RetryPolicy は build() 時に検証する（max_attempts = 0 などを起動時に弾く）
//! - Decider を差し替えない場合は RetryPolicy から DefaultDecider を作る

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::dispatcher::{CommitFailure, CommitPolicy, Dispatcher};
use crate::domain::{DefaultDecider, PolicyError, RetryPolicy};
use crate::ports::{Clock, Decider, DeliveryClient, StatusStore, SystemClock};

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BuildError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(#[from] PolicyError),

    #[error("commit policy needs at least one attempt")]
    ZeroCommitAttempts,

    #[error("decider allows zero attempts")]
    ZeroDeciderBudget,

    #[error("worker pool needs at least one worker")]
    ZeroWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .delivery_client(Arc::new(client))
///     .status_store(Arc::new(store))
///     .retry_policy(policy)
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    client: Option<Arc<dyn DeliveryClient>>,
    store: Option<Arc<dyn StatusStore>>,
    decider: Option<Arc<dyn Decider>>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    commit_policy: CommitPolicy,
    failures: Option<mpsc::Sender<CommitFailure>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            store: None,
            decider: None,
            retry_policy: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            commit_policy: CommitPolicy::default(),
            failures: None,
        }
    }

    pub fn delivery_client(mut self, client: Arc<dyn DeliveryClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn status_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Ignored when a custom decider is set.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    /// Channel that receives terminal outcomes the store refused.
    pub fn commit_failures(mut self, tx: mpsc::Sender<CommitFailure>) -> Self {
        self.failures = Some(tx);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let client = self
            .client
            .ok_or(BuildError::MissingCollaborator("delivery client"))?;
        let store = self
            .store
            .ok_or(BuildError::MissingCollaborator("status store"))?;

        let decider: Arc<dyn Decider> = match self.decider {
            Some(decider) => decider,
            None => {
                self.retry_policy.validate()?;
                Arc::new(DefaultDecider::new(self.retry_policy))
            }
        };
        if decider.max_attempts() == 0 {
            return Err(BuildError::ZeroDeciderBudget);
        }
        if self.commit_policy.max_attempts == 0 {
            return Err(BuildError::ZeroCommitAttempts);
        }

        Ok(Dispatcher::new(
            client,
            decider,
            store,
            self.clock,
            self.commit_policy,
            self.failures,
        ))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
