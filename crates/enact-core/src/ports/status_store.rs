//! StatusStore port - task ごとの終端ステータスの正本
//!
//! # 設計原則
//! - `task_id` をキーにした冪等な upsert（最初の書き込みが勝つ）
//! - 同じ task_id への 2 回目の書き込みは何もせず、既存レコードを返す
//! - Dispatcher は判断のためにここを読まない（読み出しは外部の status API 用）

use async_trait::async_trait;

use crate::domain::{StatusRecord, StoreError, TaskId};

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// This call wrote the record.
    Created,

    /// A terminal status already existed; nothing was written.
    AlreadyRecorded(StatusRecord),
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn upsert(&self, record: StatusRecord) -> Result<UpsertOutcome, StoreError>;

    async fn get(&self, task_id: &TaskId) -> Result<Option<StatusRecord>, StoreError>;
}
