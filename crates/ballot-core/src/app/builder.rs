//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! build() の時点で以下をすべて検証し、どれかが欠けていれば BuildError を返す。
//! - 設定値（interval、chat id、poll のラベル）
//! - 判定式のパース
//! - ポート（シート、チャット）が渡されているか
//! - シートのヘッダに必要な列がそろっているか（レート制限を通して 1 回だけ読む）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::app::poll_manager::{PollManager, PollSettings};
use crate::app::refresh_loop::RefreshLoop;
use crate::app::reporter::Reporter;
use crate::app::service::{ServiceHandle, dispatch_loop};
use crate::config::{Config, ConfigError};
use crate::domain::{ChatEvent, SyncError};
use crate::formula::{FormulaError, FormulaEvaluator};
use crate::ports::{ChatClient, Clock, SheetClient, SystemClock};
use crate::sheet::{RequestOrder, Spreadsheet};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("invalid decision formula: {0}")]
    Formula(#[from] FormulaError),

    #[error("no {0} client was provided")]
    MissingPort(&'static str),
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .sheet(sheet_client)
///     .chat(chat_client)
///     .build()
///     .await?;
/// let handle = app.start(chat_events);
/// ```
pub struct AppBuilder {
    config: Config,
    sheet: Option<Arc<dyn SheetClient>>,
    chat: Option<Arc<dyn ChatClient>>,
    clock: Arc<dyn Clock>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sheet: None,
            chat: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn sheet(mut self, client: Arc<dyn SheetClient>) -> Self {
        self.sheet = Some(client);
        self
    }

    pub fn chat(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.chat = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> Result<App, BuildError> {
        let config = self.config;
        config.validate()?;
        let chat_id = config.chat_id()?;
        let labels = config.label_table()?;
        let evaluator = match &config.sheet.formula {
            Some(formula) => FormulaEvaluator::parse(formula)?,
            None => FormulaEvaluator::default(),
        };
        let sheet_client = self.sheet.ok_or(BuildError::MissingPort("sheet"))?;
        let chat = self.chat.ok_or(BuildError::MissingPort("chat"))?;

        let sheet = Arc::new(Spreadsheet::new(
            sheet_client,
            RequestOrder::new(config.rate_limit_interval()),
            config.sheet.schema,
        ));
        sheet.validate_headers().await?;

        let reporter = Arc::new(Reporter::new(Arc::clone(&chat), config.report_chat()));
        let settings = PollSettings {
            chat_id,
            poll_timeout: config.poll_timeout(),
            admin: config.bot.admin.clone(),
            sheet_link: config.sheet.link.clone(),
            labels,
        };
        let manager = Arc::new(PollManager::new(
            Arc::clone(&sheet),
            chat,
            Arc::new(evaluator),
            self.clock,
            Arc::clone(&reporter),
            settings,
        ));

        info!(
            chat_id = chat_id.get(),
            schema = ?config.sheet.schema,
            poll_timeout_secs = config.poll_timeout,
            "app built"
        );
        Ok(App {
            sheet,
            manager,
            reporter,
            update_interval: config.update_interval(),
        })
    }
}

/// App は構築済みのコア。`start()` でループを起動する。
pub struct App {
    pub sheet: Arc<Spreadsheet>,
    pub manager: Arc<PollManager>,
    pub reporter: Arc<Reporter>,
    pub update_interval: Duration,
}

impl App {
    /// Spawn the refresh loop and the dispatcher.
    pub fn start(&self, chat_events: mpsc::Receiver<ChatEvent>) -> ServiceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sheet_tx, sheet_rx) = mpsc::channel(64);

        let refresh = RefreshLoop::new(
            Arc::clone(&self.sheet),
            self.update_interval,
            sheet_tx,
            Arc::clone(&self.reporter),
        );
        let refresh_join = tokio::spawn(refresh.run(shutdown_rx.clone()));
        let dispatch_join = tokio::spawn(dispatch_loop(
            Arc::clone(&self.manager),
            sheet_rx,
            chat_events,
            shutdown_rx,
        ));

        ServiceHandle::new(
            shutdown_tx,
            Arc::clone(&self.manager),
            vec![refresh_join, dispatch_join],
        )
    }
}
