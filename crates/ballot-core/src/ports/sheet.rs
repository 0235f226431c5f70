//! SheetClient port - スプレッドシート（正本 / system of record）
//!
//! 永続状態はシートの行だけ。ローカル DB は持たない。
//! このトレイトの呼び出しはすべて `sheet::RequestOrder` を通して
//! 直列化・レート制限される（実装側でロックする必要はない）。

use async_trait::async_trait;

use crate::domain::{SheetRow, SyncError};

/// SheetClient は 1 枚のシートへの一括読み書き
///
/// # 設計原則
/// - 読み込みは常に全行（差分 API は使わない）
/// - 書き込みは 1 行単位。渡したセルだけを更新し、他の列には触らない
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Header row of the sheet (column names).
    async fn header_values(&self) -> Result<Vec<String>, SyncError>;

    /// All data rows, in sheet order.
    async fn load_rows(&self) -> Result<Vec<SheetRow>, SyncError>;

    /// Update the given cells of one row.
    async fn save_row(&self, row: &SheetRow) -> Result<(), SyncError>;
}
