//! Decider port - Outcome から Decision を生成
//!
//! Decider は純粋関数として設計されます（副作用なし）。
//! 実際の sleep や commit は Dispatcher が行います。

use crate::domain::{Decision, Outcome};

/// Decider は Outcome と試行回数から Decision を生成
///
/// # 設計原則
/// - 純粋関数（outcome + attempt → next action）
/// - 予算は有限（`max_attempts` を超えて Retry を返しても Dispatcher が打ち切る）
pub trait Decider: Send + Sync {
    /// `attempt` は直前の試行の番号（1 始まり）
    fn decide(&self, outcome: &Outcome, attempt: u32) -> Decision;

    /// 1 task あたりの試行回数の上限
    fn max_attempts(&self) -> u32;
}
