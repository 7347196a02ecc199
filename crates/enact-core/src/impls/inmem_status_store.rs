//! InMemoryStatusStore - 開発・テスト用の StatusStore
//!
//! プロセスが終われば消えます。永続化が必要なら FileStatusStore を使う。

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{StatusRecord, StoreError, TaskId};
use crate::ports::{StatusStore, UpsertOutcome};

#[derive(Default)]
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<TaskId, StatusRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn upsert(&self, record: StatusRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.entry(record.task_id.clone()) {
            Entry::Occupied(existing) => Ok(UpsertOutcome::AlreadyRecorded(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn get(&self, task_id: &TaskId) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.records.read().await.get(task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureDetail, StatusKind, TerminalStatus};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn record(id: &str, status: TerminalStatus) -> StatusRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        StatusRecord::new(TaskId::parse(id).unwrap(), status, 1, at)
    }

    #[tokio::test]
    async fn duplicate_commit_leaves_one_record() {
        let store = InMemoryStatusStore::new();

        let first = store.upsert(record("a", TerminalStatus::Success)).await.unwrap();
        let second = store.upsert(record("a", TerminalStatus::Success)).await.unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert!(matches!(second, UpsertOutcome::AlreadyRecorded(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn first_terminal_write_wins() {
        let store = InMemoryStatusStore::new();
        let id = TaskId::parse("a").unwrap();

        store.upsert(record("a", TerminalStatus::Success)).await.unwrap();
        let failed = TerminalStatus::Failed(FailureDetail::Rejected {
            message: "late".to_string(),
        });
        let second = store.upsert(record("a", failed)).await.unwrap();

        match second {
            UpsertOutcome::AlreadyRecorded(existing) => assert_eq!(existing.kind, StatusKind::Success),
            other => panic!("expected AlreadyRecorded, got {other:?}"),
        }
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.kind, StatusKind::Success);
    }

    #[tokio::test]
    async fn concurrent_duplicates_create_exactly_once() {
        let store = Arc::new(InMemoryStatusStore::new());

        let mut joins = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            joins.push(tokio::spawn(async move {
                store.upsert(record("same", TerminalStatus::Success)).await.unwrap()
            }));
        }

        let mut created = 0;
        for join in joins {
            if join.await.unwrap() == UpsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = InMemoryStatusStore::new();
        assert!(store.is_empty().await);
        let missing = store.get(&TaskId::parse("nope").unwrap()).await.unwrap();
        assert!(missing.is_none());
    }
}
