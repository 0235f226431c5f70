//! RefreshLoop - シートの定期読み込み
//!
//! # フロー
//! 1. Spreadsheet::refresh()（レート制限の待ちも含む）
//! 2. 生成された SheetEvent をディスパッチャに送る
//! 3. 完了してから次のタイマーを張る（読み込みが重ならない）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::app::reporter::Reporter;
use crate::app::stopped;
use crate::domain::SheetEvent;
use crate::sheet::Spreadsheet;

pub struct RefreshLoop {
    sheet: Arc<Spreadsheet>,
    interval: Duration,
    events: mpsc::Sender<SheetEvent>,
    reporter: Arc<Reporter>,
}

impl RefreshLoop {
    pub fn new(
        sheet: Arc<Spreadsheet>,
        interval: Duration,
        events: mpsc::Sender<SheetEvent>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            sheet,
            interval,
            events,
            reporter,
        }
    }

    /// Run until shutdown or until the dispatcher goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.sheet.refresh().await {
                Ok(events) => {
                    for event in events {
                        if self.events.send(event).await.is_err() {
                            debug!("dispatcher is gone, refresh loop stops");
                            return;
                        }
                    }
                }
                // not retried early: the next tick is the retry
                Err(err) => self.reporter.failure("refreshing sheet", &err).await,
            }

            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
