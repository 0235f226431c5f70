//! Reporter - 通知と障害報告の唯一の出口
//!
//! tracing に出したうえで、設定された報告用チャットにも best-effort で転送する。
//! 転送の失敗は debug ログに残すだけで、呼び出し側には返さない。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{ChatId, ErrorKind, SyncError};
use crate::ports::ChatClient;

pub struct Reporter {
    chat: Option<Arc<dyn ChatClient>>,
    report_chat: Option<ChatId>,
}

impl Reporter {
    pub fn new(chat: Arc<dyn ChatClient>, report_chat: Option<ChatId>) -> Self {
        Self {
            chat: Some(chat),
            report_chat,
        }
    }

    /// tracing only.
    pub fn tracing_only() -> Self {
        Self {
            chat: None,
            report_chat: None,
        }
    }

    /// Routine notice; forwarded silently.
    pub async fn log(&self, msg: &str) {
        info!("{msg}");
        self.forward(format!("💬 {msg}"), true).await;
    }

    pub async fn warn(&self, msg: &str) {
        warn!("{msg}");
        self.forward(format!("⚠️ {msg}"), false).await;
    }

    pub async fn err(&self, msg: &str) {
        error!("{msg}");
        self.forward(format!("⛔️ {msg}"), false).await;
    }

    /// Report a failed operation. Lookup and label problems are warnings;
    /// everything else is an error.
    pub async fn failure(&self, context: &str, err: &SyncError) {
        let kind = err.kind();
        let msg = format!("{context}: {err}");
        match kind {
            ErrorKind::Lookup | ErrorKind::Label => {
                warn!(?kind, "{msg}");
                self.forward(format!("⚠️ {msg}"), false).await;
            }
            _ => {
                error!(?kind, "{msg}");
                self.forward(format!("⛔️ {msg}"), false).await;
            }
        }
    }

    async fn forward(&self, text: String, silent: bool) {
        let (Some(chat), Some(target)) = (&self.chat, self.report_chat) else {
            return;
        };
        if let Err(err) = chat.send_report(target, &text, silent).await {
            debug!(error = %err, "report was not delivered");
        }
    }
}
