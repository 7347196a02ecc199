//! Errors - エラー型と分類
//!
//! ネットワーク越しの配送失敗はここには現れません（`Outcome` として値で返る）。
//! ここにあるのは「ローカルの故障」だけです。

use thiserror::Error;

/// Task の検証エラー（ingress で同期的に拒否される）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task has empty ID")]
    EmptyId,
}

/// DeliveryClient のローカル故障
///
/// 配送先の 4xx/5xx やタイムアウトはこれに含まれません。
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid delivery endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("could not build delivery request: {0}")]
    InvalidRequest(String),
}

/// StatusStore の故障（Task の失敗とは区別する）
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode status record: {0}")]
    Encode(serde_json::Error),

    #[error("corrupt status record on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

/// RetryPolicy の設定値エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("base delay {base:?} exceeds max delay {max:?}")]
    BaseExceedsMax {
        base: std::time::Duration,
        max: std::time::Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_keeps_line_number() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::Corrupt { line: 7, source };
        assert!(err.to_string().contains("line 7"));
    }
}
