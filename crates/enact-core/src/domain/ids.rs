//! Domain identifiers.
//!
//! - `TaskId`: 呼び出し側が与える不透明な文字列。配送と状態更新の冪等キー。
//!   検証付きの `parse` を通らないと作れないので、空の ID は型として存在しない。
//! - `ErrorId`: ingress のエラー応答に付ける相関 ID（ULID ベース）。

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use super::errors::TaskError;

/// Identifier of a submitted Task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Validate and wrap a caller-supplied id.
    ///
    /// Blank ids (empty or whitespace only) are rejected.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TaskError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(TaskError::EmptyId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// 永続化されたレコードを読み戻すときも同じ検証を通す
impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TaskId::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Correlation id attached to ingress error responses.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorId(Ulid);

impl ErrorId {
    const PREFIX: &'static str = "err-";

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ErrorId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}
