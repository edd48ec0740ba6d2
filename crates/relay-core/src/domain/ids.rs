//! Domain identifiers (strongly-typed IDs).
//!
//! メッセージ ID は durable store が insert 時に採番します。
//! アプリ側では生成せず、受け取った値をそのまま運ぶだけです。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persisted message.
///
/// Assigned once by the durable store and never changed afterwards.
/// `#[serde(transparent)]` keeps the wire form a plain integer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// 内部の整数値を取得
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}
