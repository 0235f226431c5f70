//! InMemorySheet - 開発・テスト用のスプレッドシート
//!
//! # 実装詳細
//! - 行番号 -> SheetRow の BTreeMap（シート順 = 行番号順）
//! - save_row は渡されたセルだけを上書き（人間が入力した列は残る）
//! - ヘッダにない列への書き込みはエラー（本物のシートと同じ）
//! - 呼び出し回数を数える（レート制限のテスト用）

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{SchemaVersion, SheetRow, SyncError};
use crate::ports::SheetClient;

pub struct InMemorySheet {
    headers: Vec<String>,
    rows: Mutex<BTreeMap<u32, SheetRow>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemorySheet {
    /// Sheet whose header row has exactly the columns `schema` needs.
    pub fn new(schema: SchemaVersion) -> Self {
        Self::with_headers(
            schema
                .required_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Mutex::new(BTreeMap::new()),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<u32, SheetRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a whole row, as a human typing it in would.
    pub fn put_row(&self, row: SheetRow) {
        self.rows().insert(row.row_number, row);
    }

    /// Change one cell of an existing row. Returns `false` if there is no such row.
    pub fn edit_cell(&self, row_number: u32, column: &str, value: &str) -> bool {
        match self.rows().get_mut(&row_number) {
            Some(row) => {
                row.cells.insert(column.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn row(&self, row_number: u32) -> Option<SheetRow> {
        self.rows().get(&row_number).cloned()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following `save_row` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SheetClient for InMemorySheet {
    async fn header_values(&self) -> Result<Vec<String>, SyncError> {
        Ok(self.headers.clone())
    }

    async fn load_rows(&self) -> Result<Vec<SheetRow>, SyncError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows().values().cloned().collect())
    }

    async fn save_row(&self, row: &SheetRow) -> Result<(), SyncError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::Sheet(format!("row #{} not saved", row.row_number)));
        }
        if let Some(column) = row.cells.keys().find(|c| !self.headers.contains(c)) {
            return Err(SyncError::Sheet(format!(
                "row #{}: no `{column}` column in the sheet",
                row.row_number
            )));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows();
        let stored = rows
            .entry(row.row_number)
            .or_insert_with(|| SheetRow::new(row.row_number));
        for (column, value) in &row.cells {
            stored.cells.insert(column.clone(), value.clone());
        }
        Ok(())
    }
}
