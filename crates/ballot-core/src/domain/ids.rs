//! Domain identifiers (strongly-typed IDs).
//!
//! チャット側の ID はすべて外部システムが採番する。
//! ここでは文字列/整数をそのまま包むだけで、生成はしない。
//!
//! ## なぜ newtype にするのか？
//! - PollId と MessageId はどちらも文字列だが、混同すると close が別の poll を止めてしまう
//! - スプレッドシートのセルには文字列で保存されるので、`as_str()` で素直に書き戻せる

use serde::{Deserialize, Serialize};
use std::fmt;

/// Poll identifier assigned by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollId(String);

impl PollId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PollId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Message identifier assigned by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Chat identifier (group chats are negative on most platforms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_their_raw_value() {
        assert_eq!(PollId::new("5012").to_string(), "5012");
        assert_eq!(MessageId::from("77").as_str(), "77");
        assert_eq!(ChatId::new(-1001).to_string(), "-1001");
    }

    #[test]
    fn chat_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&ChatId::new(-42)).unwrap();
        assert_eq!(json, "-42");
    }
}
