//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（スプレッドシート、チャット）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - スプレッドシートが source of truth（正本）
//! - チャットは poll の表示と投票の受付のみ
//! - 時刻は Clock で差し替え可能

pub mod chat;
pub mod clock;
pub mod evaluator;
pub mod sheet;

// 主要な trait を再エクスポート
pub use self::chat::{ChatClient, OpenedPoll};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::evaluator::OutcomeEvaluator;
pub use self::sheet::SheetClient;
