//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の in-memory 実装を含めます。
//!
//! # 含まれる実装
//! - **InMemorySheet**: 開発用のスプレッドシート（呼び出し回数を記録）
//! - **InMemoryChat**: 開発用のチャット（送信をすべて記録、イベントを注入可能）
//!
//! # 本番用実装
//! Google Sheets / Telegram のクライアントは別クレートに配置する想定です。

pub mod inmem_chat;
pub mod inmem_sheet;

// 主要な型を再エクスポート
pub use self::inmem_chat::{ChatCall, InMemoryChat};
pub use self::inmem_sheet::InMemorySheet;
