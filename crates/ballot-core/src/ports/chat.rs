//! ChatClient port - チャットプラットフォーム（メッセージ送信と poll）
//!
//! 受信側（poll 更新、bot 追加）は `ChatEvent` のストリームとして
//! `tokio::sync::mpsc::Receiver` でサービスに渡す。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageId, PollId, SyncError};

/// Result of opening a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPoll {
    pub message_id: MessageId,
    pub poll_id: PollId,
    pub created_at: DateTime<Utc>,
}

/// ChatClient は送信系の API
///
/// # Thread Safety
/// - `Send + Sync` を要求（close タイマーが別タスクから呼ぶ）
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send an HTML message, returning its id.
    async fn send_announcement(&self, chat: ChatId, text: &str) -> Result<MessageId, SyncError>;

    /// Open a non-anonymous poll.
    async fn open_poll(
        &self,
        chat: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<OpenedPoll, SyncError>;

    /// Stop a poll (no further votes) and reply with `reason`.
    async fn stop_poll(&self, chat: ChatId, message: &MessageId, reason: &str)
    -> Result<(), SyncError>;

    /// Replace the text of a previously sent message.
    async fn edit_message(&self, chat: ChatId, message: &MessageId, text: &str)
    -> Result<(), SyncError>;

    async fn member_count(&self, chat: ChatId) -> Result<u32, SyncError>;

    /// Operator notice. `silent` suppresses the notification sound.
    async fn send_report(&self, chat: ChatId, text: &str, silent: bool) -> Result<(), SyncError>;
}
