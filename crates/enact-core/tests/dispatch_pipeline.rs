//! Worker pool → HTTP client → file store, against a mock worker.

use std::sync::Arc;
use std::time::Duration;

use enact_core::app::{DispatcherBuilder, PoolConfig, WorkerPool};
use enact_core::domain::{FailureDetail, RetryPolicy, StatusKind, Task, TaskId};
use enact_core::impls::{FileStatusStore, HttpDeliveryClient};
use enact_core::ports::StatusStore;
use mockito::Matcher;
use secrecy::SecretString;
use serde_json::json;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..RetryPolicy::default()
    }
}

async fn run(
    endpoint: &str,
    store_path: &std::path::Path,
    policy: RetryPolicy,
    tasks: Vec<Task>,
) {
    let client = HttpDeliveryClient::new(
        endpoint,
        Some(SecretString::from("token".to_string())),
        Duration::from_secs(5),
    )
    .unwrap();
    let store = Arc::new(FileStatusStore::open(store_path).await.unwrap());
    let dispatcher = DispatcherBuilder::new()
        .delivery_client(Arc::new(client))
        .status_store(store)
        .retry_policy(policy)
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
    for task in tasks {
        submitter.submit(task).unwrap();
    }
    pool.shutdown_and_join().await;
}

fn task(id: &str) -> Task {
    let mut payload = serde_json::Map::new();
    payload.insert("kind".to_string(), json!("thumbnail"));
    Task::new(TaskId::parse(id).unwrap(), payload)
}

#[tokio::test]
async fn delivered_tasks_are_persisted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer token")
        .match_body(Matcher::PartialJson(json!({"kind": "thumbnail"})))
        .with_status(202)
        .expect(5)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.jsonl");

    let tasks = (0..5).map(|i| task(&format!("t-{i}"))).collect();
    run(&server.url(), &path, fast_policy(3), tasks).await;

    mock.assert_async().await;
    let store = FileStatusStore::open(&path).await.unwrap();
    for i in 0..5 {
        let id = TaskId::parse(format!("t-{i}")).unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.kind, StatusKind::Success);
        assert_eq!(record.attempts, 1);
    }
}

#[tokio::test]
async fn overloaded_worker_exhausts_the_budget() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(503)
        .with_body("busy")
        .expect(3)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.jsonl");

    run(&server.url(), &path, fast_policy(3), vec![task("slow")]).await;

    mock.assert_async().await;
    let store = FileStatusStore::open(&path).await.unwrap();
    let record = store
        .get(&TaskId::parse("slow").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, StatusKind::Failed);
    assert_eq!(record.attempts, 3);
    match record.detail {
        Some(FailureDetail::Exhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("busy"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_task_is_tried_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(400)
        .expect(1)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.jsonl");

    run(&server.url(), &path, fast_policy(5), vec![task("bad")]).await;

    mock.assert_async().await;
    let store = FileStatusStore::open(&path).await.unwrap();
    let record = store
        .get(&TaskId::parse("bad").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(record.detail, Some(FailureDetail::Rejected { .. })));
}
