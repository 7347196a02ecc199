//! DeliveryClient port - リモート worker への 1 回の配送
//!
//! # 設計原則
//! - 1 回の呼び出し = 1 回のネットワーク往復
//! - 配送先の失敗（4xx/5xx, 接続エラー, タイムアウト）は `Outcome` として値で返す
//! - `Err` はローカル故障（シリアライズ不能など）のみ

use async_trait::async_trait;

use crate::domain::{DeliveryError, Outcome, Task};

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn attempt(&self, task: &Task) -> Result<Outcome, DeliveryError>;
}
