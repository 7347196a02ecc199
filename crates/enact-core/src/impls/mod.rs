//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpDeliveryClient**: reqwest による配送クライアント（本番用）
//! - **InMemoryStatusStore**: 開発・テスト用の正本
//! - **FileStatusStore**: JSON Lines ファイルによる永続的な正本

pub mod file_status_store;
pub mod http_delivery;
pub mod inmem_status_store;

pub use self::file_status_store::FileStatusStore;
pub use self::http_delivery::{HttpDeliveryClient, StatusClass, classify_status};
pub use self::inmem_status_store::InMemoryStatusStore;
