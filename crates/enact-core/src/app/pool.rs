//! WorkerPool - 受け付けた task を有界並列で dispatch する
//!
//! # 方針
//! - 受付キューは有界 mpsc。満杯なら `submit()` は即座に `QueueFull` を返す（待たない）
//! - ワーカー数 = 同時に配送中の task 数の上限
//! - shutdown 後は新規受付を拒否し、キューに残っている task は処理してから終了する
//!   （受信側を close してから空になるまで recv する）
//! - 1 task の panic は他の task に波及しない

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::builder::BuildError;
use crate::app::dispatcher::{CommitResult, Dispatcher};
use crate::app::status::{PoolCounters, PoolCounts};
use crate::domain::{StatusKind, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 1024,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.workers == 0 {
            return Err(BuildError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(BuildError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("dispatch queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Cheap handle for handing tasks to the pool.
#[derive(Clone)]
pub struct Submitter {
    tx: mpsc::Sender<Task>,
    capacity: usize,
    shutdown_rx: watch::Receiver<bool>,
    counters: Arc<PoolCounters>,
}

impl Submitter {
    /// Enqueue without waiting. Acceptance only means the task is queued.
    pub fn submit(&self, task: Task) -> Result<(), SubmitError> {
        if *self.shutdown_rx.borrow() {
            PoolCounters::incr(&self.counters.rejected_submissions);
            return Err(SubmitError::ShuttingDown);
        }

        // counted before the send so a fast worker never decrements first
        PoolCounters::incr(&self.counters.queued);
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(err) => {
                PoolCounters::decr(&self.counters.queued);
                PoolCounters::incr(&self.counters.rejected_submissions);
                match err {
                    TrySendError::Full(task) => {
                        warn!(task_id = %task.id(), capacity = self.capacity, "dispatch queue full");
                        Err(SubmitError::QueueFull {
                            capacity: self.capacity,
                        })
                    }
                    TrySendError::Closed(_) => Err(SubmitError::ShuttingDown),
                }
            }
        }
    }

    pub fn counts(&self) -> PoolCounts {
        self.counters.snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Worker pool handle.
/// - `request_shutdown()` で受付停止
/// - `shutdown_and_join()` でキューを捌き切るまで待つ
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    submitter: Submitter,
}

impl WorkerPool {
    pub fn spawn(config: PoolConfig, dispatcher: Arc<Dispatcher>) -> Result<Self, BuildError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(PoolCounters::default());

        let mut joins = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let dispatcher = Arc::clone(&dispatcher);
            let counters = Arc::clone(&counters);
            let mut shutdown_rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, dispatcher, counters, &mut shutdown_rx).await;
            }));
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );
        Ok(Self {
            shutdown_tx,
            joins,
            submitter: Submitter {
                tx,
                capacity: config.queue_capacity,
                shutdown_rx,
                counters,
            },
        })
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn counts(&self) -> PoolCounts {
        self.submitter.counts()
    }

    /// Stop accepting tasks. Queued and in-flight tasks still run to completion.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        info!(counts = ?self.submitter.counts(), "worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    dispatcher: Arc<Dispatcher>,
    counters: Arc<PoolCounters>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        let task = {
            let mut rx = rx.lock().await;
            if *shutdown_rx.borrow() {
                // after close no send succeeds; what is already queued still drains
                rx.close();
                match rx.recv().await {
                    Some(task) => task,
                    None => break,
                }
            } else {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    task = rx.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                }
            }
        };

        PoolCounters::decr(&counters.queued);
        PoolCounters::incr(&counters.in_flight);

        let task_id = task.id().clone();
        let dispatcher = Arc::clone(&dispatcher);
        let result = tokio::spawn(async move { dispatcher.dispatch(task).await }).await;

        PoolCounters::decr(&counters.in_flight);
        match result {
            Ok(report) => {
                match report.status.kind() {
                    StatusKind::Success => PoolCounters::incr(&counters.succeeded),
                    StatusKind::Failed => PoolCounters::incr(&counters.failed),
                }
                if matches!(report.commit, CommitResult::Failed(_)) {
                    PoolCounters::incr(&counters.commit_failures);
                }
            }
            Err(e) => {
                error!(worker_id, %task_id, error = %e, "dispatch aborted");
                PoolCounters::incr(&counters.failed);
            }
        }
    }
    debug!(worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::DispatcherBuilder;
    use crate::domain::{DeliveryError, FailureDetail, Outcome, TaskId};
    use crate::impls::InMemoryStatusStore;
    use crate::ports::{DeliveryClient, StatusStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks how many attempts run at the same time.
    #[derive(Default)]
    struct ConcurrencyMeter {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryClient for ConcurrencyMeter {
        async fn attempt(&self, task: &Task) -> Result<Outcome, DeliveryError> {
            if task.id().as_str() == "boom" {
                panic!("worker exploded");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Outcome::Success)
        }
    }

    fn pool(
        config: PoolConfig,
        client: Arc<ConcurrencyMeter>,
        store: Arc<InMemoryStatusStore>,
    ) -> WorkerPool {
        let dispatcher = DispatcherBuilder::new()
            .delivery_client(client)
            .status_store(store)
            .build()
            .unwrap();
        WorkerPool::spawn(config, Arc::new(dispatcher)).unwrap()
    }

    fn task(id: &str) -> Task {
        Task::with_id(TaskId::parse(id).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_never_exceeds_worker_count() {
        let client = Arc::new(ConcurrencyMeter::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let pool = pool(
            PoolConfig {
                workers: 3,
                queue_capacity: 32,
            },
            client.clone(),
            store.clone(),
        );

        let submitter = pool.submitter();
        for i in 0..20 {
            submitter.submit(task(&format!("t-{i}"))).unwrap();
        }
        pool.shutdown_and_join().await;

        assert!(client.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(client.calls.load(Ordering::SeqCst), 20);
        assert_eq!(store.len().await, 20);
        let counts = submitter.counts();
        assert_eq!(counts.succeeded, 20);
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_rejects_immediately() {
        let client = Arc::new(ConcurrencyMeter::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let pool = pool(
            PoolConfig {
                workers: 1,
                queue_capacity: 1,
            },
            client,
            store.clone(),
        );

        // no await between the two: the worker has not picked up the first yet
        let submitter = pool.submitter();
        submitter.submit(task("first")).unwrap();
        let err = submitter.submit(task("second")).unwrap_err();

        assert_eq!(err, SubmitError::QueueFull { capacity: 1 });
        assert_eq!(submitter.counts().rejected_submissions, 1);

        pool.shutdown_and_join().await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_queue_and_refuses_new_work() {
        let client = Arc::new(ConcurrencyMeter::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let pool = pool(PoolConfig::default(), client, store.clone());
        let submitter = pool.submitter();

        for i in 0..5 {
            submitter.submit(task(&format!("t-{i}"))).unwrap();
        }
        pool.request_shutdown();
        assert_eq!(submitter.submit(task("late")).unwrap_err(), SubmitError::ShuttingDown);

        pool.shutdown_and_join().await;
        assert_eq!(store.len().await, 5);
        assert!(
            store
                .get(&TaskId::parse("late").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_task_does_not_stop_the_worker() {
        let client = Arc::new(ConcurrencyMeter::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let pool = pool(
            PoolConfig {
                workers: 1,
                queue_capacity: 4,
            },
            client,
            store.clone(),
        );
        let submitter = pool.submitter();

        submitter.submit(task("boom")).unwrap();
        submitter.submit(task("after")).unwrap();
        pool.shutdown_and_join().await;

        assert!(
            store
                .get(&TaskId::parse("after").unwrap())
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(submitter.counts().failed, 1);
        assert_eq!(submitter.counts().succeeded, 1);
    }

    /// Outcome depends on the id prefix; `flaky-*` fails twice before succeeding.
    #[derive(Default)]
    struct MixedWorker {
        tries: std::sync::Mutex<std::collections::HashMap<String, u32>>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryClient for MixedWorker {
        async fn attempt(&self, task: &Task) -> Result<Outcome, DeliveryError> {
            let id = task.id().as_str();
            let attempt = {
                let mut tries = self.tries.lock().unwrap();
                let n = tries.entry(id.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            Ok(match id.split('-').next() {
                Some("ok") => Outcome::Success,
                Some("flaky") if attempt > 2 => Outcome::Success,
                Some("flaky") | Some("down") => Outcome::retryable("status 503"),
                _ => Outcome::terminal("status 422"),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_tasks_settle_independently() {
        let client = Arc::new(MixedWorker::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let dispatcher = DispatcherBuilder::new()
            .delivery_client(client.clone())
            .status_store(store.clone())
            .retry_policy(crate::domain::RetryPolicy {
                max_attempts: 4,
                ..crate::domain::RetryPolicy::default()
            })
            .build()
            .unwrap();
        let pool = WorkerPool::spawn(
            PoolConfig {
                workers: 3,
                queue_capacity: 16,
            },
            Arc::new(dispatcher),
        )
        .unwrap();

        let submitter = pool.submitter();
        for i in 0..3 {
            for kind in ["ok", "flaky", "down", "bad"] {
                submitter.submit(task(&format!("{kind}-{i}"))).unwrap();
            }
        }
        pool.shutdown_and_join().await;

        assert!(client.peak.load(Ordering::SeqCst) <= 3);
        for i in 0..3 {
            let get = |kind: &str| {
                let store = store.clone();
                let id = TaskId::parse(format!("{kind}-{i}")).unwrap();
                async move { store.get(&id).await.unwrap().unwrap() }
            };

            let ok = get("ok").await;
            assert_eq!((ok.kind, ok.attempts, ok.detail), (StatusKind::Success, 1, None));

            let flaky = get("flaky").await;
            assert_eq!((flaky.kind, flaky.attempts, flaky.detail), (StatusKind::Success, 3, None));

            let down = get("down").await;
            assert_eq!(down.kind, StatusKind::Failed);
            assert_eq!(down.attempts, 4);
            assert_eq!(
                down.detail,
                Some(FailureDetail::Exhausted {
                    attempts: 4,
                    last_error: "status 503".to_string()
                })
            );

            let bad = get("bad").await;
            assert_eq!(bad.kind, StatusKind::Failed);
            assert_eq!(bad.attempts, 1);
            assert!(matches!(bad.detail, Some(FailureDetail::Rejected { .. })));
        }
        let counts = submitter.counts();
        assert_eq!(counts.succeeded, 6);
        assert_eq!(counts.failed, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn send_racing_shutdown_is_still_delivered() {
        let client = Arc::new(ConcurrencyMeter::default());
        let store = Arc::new(InMemoryStatusStore::new());
        let pool = pool(PoolConfig::default(), client, store.clone());
        let submitter = pool.submitter();

        // a send that passed the shutdown check just before the flag flipped
        pool.request_shutdown();
        submitter.tx.try_send(task("straggler")).unwrap();

        pool.shutdown_and_join().await;
        assert!(
            store
                .get(&TaskId::parse("straggler").unwrap())
                .await
                .unwrap()
                .is_some()
        );
        assert!(matches!(
            submitter.tx.try_send(task("late")),
            Err(TrySendError::Closed(_))
        ));
    }

    #[test]
    fn zero_sized_config_is_rejected() {
        let workers = PoolConfig {
            workers: 0,
            queue_capacity: 1,
        };
        let capacity = PoolConfig {
            workers: 1,
            queue_capacity: 0,
        };
        assert_eq!(workers.validate(), Err(BuildError::ZeroWorkers));
        assert_eq!(capacity.validate(), Err(BuildError::ZeroQueueCapacity));
    }
}
