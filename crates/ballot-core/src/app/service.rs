//! Service - イベントディスパッチャと shutdown
//!
//! シートのイベントとチャットのイベントを 1 本のループで順番に処理する。
//! close タイマーだけは PollManager が別タスクで持つ。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::app::poll_manager::PollManager;
use crate::app::stopped;
use crate::domain::{ChatEvent, SheetEvent};

/// Running service handle.
/// - `request_shutdown()` でループとタイマーを止める
/// - `shutdown_and_join()` で終了を待てる
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
    manager: Arc<PollManager>,
    joins: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    pub(crate) fn new(
        shutdown_tx: watch::Sender<bool>,
        manager: Arc<PollManager>,
        joins: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            shutdown_tx,
            manager,
            joins,
        }
    }

    pub fn manager(&self) -> &Arc<PollManager> {
        &self.manager
    }

    /// Stop taking new events and drop pending close timers. Work already
    /// in flight finishes.
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.manager.shutdown();
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        info!("service stopped");
    }
}

/// Process events one at a time until shutdown or until both streams end.
pub(crate) async fn dispatch_loop(
    manager: Arc<PollManager>,
    mut sheet_events: mpsc::Receiver<SheetEvent>,
    mut chat_events: mpsc::Receiver<ChatEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            Some(event) = sheet_events.recv() => manager.on_sheet_event(event).await,
            Some(event) = chat_events.recv() => manager.on_chat_event(event).await,
            else => break,
        }
    }
}
