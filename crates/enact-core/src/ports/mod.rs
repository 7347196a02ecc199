//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! Dispatcher はここにある trait だけに依存し、具体的な実装
//! （HTTP クライアント、ファイル、テスト用 fake）は外から注入されます。

pub mod clock;
pub mod decider;
pub mod delivery;
pub mod id_generator;
pub mod status_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decider::Decider;
pub use self::delivery::DeliveryClient;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::status_store::{StatusStore, UpsertOutcome};
