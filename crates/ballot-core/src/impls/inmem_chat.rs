//! InMemoryChat - 開発・テスト用のチャット
//!
//! # 実装詳細
//! - 送信系の呼び出しはすべて `ChatCall` として記録する
//! - poll id は ULID、message id は連番
//! - 受信側（poll 更新）は `subscribe()` で得た mpsc チャネルに流す

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::domain::{ChatEvent, ChatId, MessageId, PollId, PollOption, PollSnapshot, SyncError};
use crate::ports::{ChatClient, Clock, OpenedPoll};

/// One outgoing call, as recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCall {
    Announcement {
        chat: ChatId,
        message_id: MessageId,
        text: String,
    },
    OpenPoll {
        chat: ChatId,
        message_id: MessageId,
        poll_id: PollId,
        question: String,
        options: Vec<String>,
    },
    StopPoll {
        chat: ChatId,
        message_id: MessageId,
        reason: String,
    },
    Edit {
        chat: ChatId,
        message_id: MessageId,
        text: String,
    },
    Report {
        chat: ChatId,
        text: String,
        silent: bool,
    },
}

pub struct InMemoryChat {
    clock: Arc<dyn Clock>,
    calls: Mutex<Vec<ChatCall>>,
    next_message: AtomicU64,
    members: AtomicU32,
    fail_stop: AtomicBool,
    events: Mutex<Option<mpsc::Sender<ChatEvent>>>,
}

impl InMemoryChat {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            calls: Mutex::new(Vec::new()),
            next_message: AtomicU64::new(100),
            members: AtomicU32::new(0),
            fail_stop: AtomicBool::new(false),
            events: Mutex::new(None),
        }
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<ChatCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: ChatCall) {
        self.lock_calls().push(call);
    }

    fn next_message_id(&self) -> MessageId {
        MessageId::new(self.next_message.fetch_add(1, Ordering::SeqCst).to_string())
    }

    pub fn set_member_count(&self, count: u32) {
        self.members.store(count, Ordering::SeqCst);
    }

    /// Make every following `stop_poll` fail.
    pub fn fail_stop_poll(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.lock_calls().clone()
    }

    pub fn opened_polls(&self) -> Vec<ChatCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ChatCall::OpenPoll { .. }))
            .collect()
    }

    /// Reasons of every stopped poll, in order.
    pub fn stop_reasons(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChatCall::StopPoll { reason, .. } => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChatCall::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Incoming event stream. A second call replaces the first subscriber.
    pub fn subscribe(&self) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(64);
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Deliver an event to the subscriber. Returns `false` if nobody listens.
    pub async fn emit(&self, event: ChatEvent) -> bool {
        let tx = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Deliver a poll update with the given per-label counts and the current
    /// member count.
    pub async fn vote(&self, poll_id: &PollId, counts: &[(&str, u32)]) -> bool {
        let snapshot = PollSnapshot {
            poll_id: poll_id.clone(),
            options: counts
                .iter()
                .map(|(label, n)| PollOption::new(*label, *n))
                .collect(),
            is_closed: false,
            total_members: self.members.load(Ordering::SeqCst),
        };
        self.emit(ChatEvent::PollUpdate(snapshot)).await
    }
}

#[async_trait]
impl ChatClient for InMemoryChat {
    async fn send_announcement(&self, chat: ChatId, text: &str) -> Result<MessageId, SyncError> {
        let message_id = self.next_message_id();
        self.record(ChatCall::Announcement {
            chat,
            message_id: message_id.clone(),
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn open_poll(
        &self,
        chat: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<OpenedPoll, SyncError> {
        let opened = OpenedPoll {
            message_id: self.next_message_id(),
            poll_id: PollId::new(Ulid::new().to_string()),
            created_at: self.clock.now(),
        };
        self.record(ChatCall::OpenPoll {
            chat,
            message_id: opened.message_id.clone(),
            poll_id: opened.poll_id.clone(),
            question: question.to_string(),
            options: options.to_vec(),
        });
        Ok(opened)
    }

    async fn stop_poll(
        &self,
        chat: ChatId,
        message: &MessageId,
        reason: &str,
    ) -> Result<(), SyncError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(SyncError::Chat(format!("cannot stop poll in message {message}")));
        }
        self.record(ChatCall::StopPoll {
            chat,
            message_id: message.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: &MessageId,
        text: &str,
    ) -> Result<(), SyncError> {
        self.record(ChatCall::Edit {
            chat,
            message_id: message.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn member_count(&self, _chat: ChatId) -> Result<u32, SyncError> {
        Ok(self.members.load(Ordering::SeqCst))
    }

    async fn send_report(&self, chat: ChatId, text: &str, silent: bool) -> Result<(), SyncError> {
        self.record(ChatCall::Report {
            chat,
            text: text.to_string(),
            silent,
        });
        Ok(())
    }
}
