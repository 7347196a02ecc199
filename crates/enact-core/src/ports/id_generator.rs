//! IdGenerator port - ID 生成の抽象化
//!
//! ingress のエラー応答に付ける相関 ID を生成します。
//! テスト容易性のために、trait として抽象化しています。

use crate::domain::ErrorId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は相関 ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の request handler から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_error_id(&self) -> ErrorId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// 時刻でソートできるので、ログの相関 ID として並べやすい。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_error_id(&self) -> ErrorId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ErrorId::from(ulid)
    }
}
