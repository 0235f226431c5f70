//! Row snapshot store: the last two full reads of the sheet.

use std::mem;

use crate::domain::{PollId, ProposalRow};

/// Current and previous generation of rows, in sheet order.
///
/// Lookups hand out clones; nothing outside the store holds on to a row
/// past the next refresh.
#[derive(Debug, Default)]
pub struct RowSnapshotStore {
    current: Vec<ProposalRow>,
    previous: Vec<ProposalRow>,
    generation: u64,
}

impl RowSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh read. Returns `true` on the very first install.
    pub fn install(&mut self, rows: Vec<ProposalRow>) -> bool {
        self.previous = mem::replace(&mut self.current, rows);
        self.generation += 1;
        self.generation == 1
    }

    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> &[ProposalRow] {
        &self.current
    }

    pub fn previous(&self) -> &[ProposalRow] {
        &self.previous
    }

    pub fn find_by_poll_id(&self, poll_id: &PollId) -> Option<&ProposalRow> {
        self.current
            .iter()
            .find(|row| row.poll_id.as_ref() == Some(poll_id))
    }

    pub fn find_by_row_number(&self, row_number: u32) -> Option<&ProposalRow> {
        self.current.iter().find(|row| row.row_number == row_number)
    }

    /// Reflect a successful write in the current generation.
    ///
    /// Returns `false` if the row is not part of the current read.
    pub fn update(&mut self, row: ProposalRow) -> bool {
        match self
            .current
            .iter_mut()
            .find(|r| r.row_number == row.row_number)
        {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }
}
