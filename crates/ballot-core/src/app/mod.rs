//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて同期コアを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 設定とポートからの構築（Fail-fast 検証）
//! - **PollManager**: poll の open / 投票反映 / close
//! - **RefreshLoop**: シートの定期読み込み
//! - **Service**: イベントの直列ディスパッチと shutdown
//! - **Reporter**: ログと報告チャットへの通知

pub mod builder;
pub mod poll_manager;
pub mod refresh_loop;
pub mod reporter;
pub mod service;
pub mod text;

use tokio::sync::watch;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::poll_manager::{PollManager, PollSettings};
pub use self::refresh_loop::RefreshLoop;
pub use self::reporter::Reporter;
pub use self::service::ServiceHandle;

/// Resolves once shutdown was requested or the sender is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
