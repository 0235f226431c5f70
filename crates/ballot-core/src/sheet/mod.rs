//! Spreadsheet gateway.
//!
//! Every request to the sheet goes through one `RequestOrder`, and the slot
//! is held until the local snapshot reflects the result. Lock order is
//! always slot -> state lock; lookups take only the state lock.

pub mod detector;
pub mod order;
pub mod snapshot;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{PollId, ProposalRow, SchemaVersion, SheetEvent, SyncError};
use crate::ports::SheetClient;

pub use self::detector::ChangeDetector;
pub use self::order::{RequestOrder, Slot, Ticket};
pub use self::snapshot::RowSnapshotStore;

#[derive(Debug, Default)]
struct SheetState {
    store: RowSnapshotStore,
    detector: ChangeDetector,
}

pub struct Spreadsheet {
    client: Arc<dyn SheetClient>,
    order: RequestOrder,
    schema: SchemaVersion,
    state: Mutex<SheetState>,
}

impl Spreadsheet {
    pub fn new(client: Arc<dyn SheetClient>, order: RequestOrder, schema: SchemaVersion) -> Self {
        Self {
            client,
            order,
            schema,
            state: Mutex::new(SheetState::default()),
        }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// Check the header row against the schema's required columns.
    pub async fn validate_headers(&self) -> Result<(), SyncError> {
        let headers = {
            let _slot = self.order.reserve().await;
            self.client.header_values().await?
        };
        self.schema.validate_headers(&headers)
    }

    /// One rate-limited bulk read. Rotates the snapshot pair and returns the
    /// events of this generation (`FirstLoad` first, then edits, then new
    /// proposals).
    pub async fn refresh(&self) -> Result<Vec<SheetEvent>, SyncError> {
        let _slot = self.order.reserve().await;
        let raw = self.client.load_rows().await?;
        let rows: Vec<ProposalRow> = raw
            .iter()
            .map(|row| ProposalRow::from_sheet_row(row, self.schema))
            .collect();

        let mut state = self.state.lock().await;
        let SheetState { store, detector } = &mut *state;
        let first = store.install(rows);

        let mut events = Vec::new();
        if first {
            events.push(SheetEvent::FirstLoad(store.current().to_vec()));
        }
        events.extend(detector.detect(store.current(), store.previous()));
        debug!(
            generation = store.generation(),
            rows = store.current().len(),
            events = events.len(),
            "sheet refreshed"
        );
        Ok(events)
    }

    /// Write the core-owned cells of `row` and reflect them locally.
    pub async fn save_row(&self, row: &ProposalRow) -> Result<(), SyncError> {
        let _slot = self.order.reserve().await;
        self.client
            .save_row(&row.to_sheet_row(self.schema))
            .await?;
        let mut state = self.state.lock().await;
        if !state.store.update(row.clone()) {
            debug!(row = row.row_number, "saved row is not in the current snapshot");
        }
        Ok(())
    }

    pub async fn find_by_poll_id(&self, poll_id: &PollId) -> Option<ProposalRow> {
        self.state.lock().await.store.find_by_poll_id(poll_id).cloned()
    }

    pub async fn find_by_row_number(&self, row_number: u32) -> Option<ProposalRow> {
        self.state
            .lock()
            .await
            .store
            .find_by_row_number(row_number)
            .cloned()
    }

    pub async fn rows(&self) -> Vec<ProposalRow> {
        self.state.lock().await.store.current().to_vec()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.store.is_loaded()
    }
}
