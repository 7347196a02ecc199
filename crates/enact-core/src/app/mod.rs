//! App - アプリケーション層
//!
//! ports を組み合わせて配送のライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **DispatcherBuilder**: Dispatcher の構築とワイヤリング（起動時検証）
//! - **Dispatcher**: 1 task の attempt → decide → wait → commit ループ
//! - **WorkerPool**: 有界キュー + 有界並列で Dispatcher を回す
//! - **PoolCounts**: プールの状態スナップショット

pub mod builder;
pub mod dispatcher;
pub mod pool;
pub mod status;

pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::dispatcher::{CommitFailure, CommitPolicy, CommitResult, DispatchReport, Dispatcher};
pub use self::pool::{PoolConfig, SubmitError, Submitter, WorkerPool};
pub use self::status::PoolCounts;
