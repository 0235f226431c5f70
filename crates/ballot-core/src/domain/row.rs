//! Proposal rows: raw sheet cells and the typed view the core works with.
//!
//! Design:
//! - `SheetRow` is what the sheet port exchanges (column -> string).
//! - `ProposalRow` is parsed leniently: a half-filled row must never stop the
//!   refresh loop, so blank/invalid numbers fall back to 0 / None.
//! - Only the columns the core owns are written back (`to_sheet_row`).
//! - The general layout has no `pollid` / `done` columns. Its single
//!   `messageid` cell carries the whole poll reference (`PollRef`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{MessageId, PollId};
use super::outcome::OutcomeCode;
use super::schema::SchemaVersion;
use super::state::ProposalState;
use super::tally::{TallyField, VoteTally};

/// Spreadsheet booleans are strings typed by humans.
pub fn is_true(cell: &str) -> bool {
    let cell = cell.trim().to_lowercase();
    cell == "true" || cell == "1"
}

fn bool_cell(value: bool) -> String {
    let cell = if value { "TRUE" } else { "FALSE" };
    cell.to_string()
}

/// A raw sheet row as read from / written to the sheet port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub row_number: u32,
    pub cells: BTreeMap<String, String>,
}

impl SheetRow {
    pub fn new(row_number: u32) -> Self {
        Self {
            row_number,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Typed view of one proposal row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRow {
    pub row_number: u32,
    pub name: String,
    pub invited_by: String,
    pub user_invited: String,
    pub email: String,
    pub info: String,
    pub validated: bool,
    pub voting_put: bool,
    pub done: bool,
    pub poll_id: Option<PollId>,
    /// Announcement message (new-member schema only).
    pub message_id1: Option<MessageId>,
    /// Poll message.
    pub message_id2: Option<MessageId>,
    /// Poll creation time, epoch seconds.
    pub time_start: Option<i64>,
    pub tally: VoteTally,
    /// Raw `vote.result` cell.
    pub result: String,
}

/// Poll reference stored in the `messageid` cell of the general layout:
/// `<message>:<poll>` while open, `<message>:<poll>:done` once closed.
/// A bare `<message>` (typed in by hand) has no poll attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollRef {
    pub message_id: Option<MessageId>,
    pub poll_id: Option<PollId>,
    pub done: bool,
}

const DONE_MARK: &str = "done";

impl PollRef {
    pub fn parse(cell: &str) -> Self {
        let mut parts = cell.trim().splitn(3, ':');
        let message_id = parts.next().and_then(non_empty).map(MessageId::new);
        let poll_id = parts.next().and_then(non_empty).map(PollId::new);
        let done = parts.next().is_some_and(|mark| mark.trim() == DONE_MARK);
        Self {
            message_id,
            poll_id,
            done,
        }
    }

    pub fn to_cell(&self) -> String {
        let Some(message) = &self.message_id else {
            return String::new();
        };
        match (&self.poll_id, self.done) {
            (None, _) => message.as_str().to_string(),
            (Some(poll), false) => format!("{message}:{poll}"),
            (Some(poll), true) => format!("{message}:{poll}:{DONE_MARK}"),
        }
    }
}

fn non_empty(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}

fn count_cell(cell: &str) -> u32 {
    cell.trim().parse().unwrap_or(0)
}

impl ProposalRow {
    pub fn from_sheet_row(row: &SheetRow, schema: SchemaVersion) -> Self {
        let mut tally = VoteTally::new().with_total(count_cell(row.get("vote.total")));
        for field in TallyField::ALL {
            tally.set(field, count_cell(row.get(field.column())));
        }

        let (message_id1, message_id2, poll_id, done) = match schema {
            SchemaVersion::NewMember => (
                non_empty(row.get("messageid1")).map(MessageId::new),
                non_empty(row.get("messageid2")).map(MessageId::new),
                non_empty(row.get("pollid")).map(PollId::new),
                is_true(row.get("done")),
            ),
            SchemaVersion::General => {
                let poll = PollRef::parse(row.get("messageid"));
                (None, poll.message_id, poll.poll_id, poll.done)
            }
        };

        Self {
            row_number: row.row_number,
            name: row.get("name").to_string(),
            invited_by: row.get("invitedby").to_string(),
            user_invited: row.get("userinvited").to_string(),
            email: row.get("email").to_string(),
            info: row.get("info").to_string(),
            validated: is_true(row.get("validated")),
            voting_put: is_true(row.get("votingput")),
            done,
            poll_id,
            message_id1,
            message_id2,
            time_start: row.get("timestart").trim().parse().ok(),
            tally,
            result: row.get("vote.result").trim().to_string(),
        }
    }

    /// Cells owned by the core. Human-entered columns are never written.
    pub fn to_sheet_row(&self, schema: SchemaVersion) -> SheetRow {
        let opt = |v: Option<&str>| v.unwrap_or("").to_string();
        let mut row = SheetRow::new(self.row_number)
            .with("votingput", bool_cell(self.voting_put))
            .with(
                "timestart",
                self.time_start.map(|t| t.to_string()).unwrap_or_default(),
            )
            .with("vote.total", self.tally.total.to_string())
            .with("vote.result", self.result.clone());
        for field in TallyField::ALL {
            row = row.with(field.column(), self.tally.get(field).to_string());
        }
        match schema {
            SchemaVersion::NewMember => row
                .with("done", bool_cell(self.done))
                .with("pollid", opt(self.poll_id.as_ref().map(PollId::as_str)))
                .with(
                    "messageid1",
                    opt(self.message_id1.as_ref().map(MessageId::as_str)),
                )
                .with(
                    "messageid2",
                    opt(self.message_id2.as_ref().map(MessageId::as_str)),
                ),
            SchemaVersion::General => {
                let poll = PollRef {
                    message_id: self.message_id2.clone(),
                    poll_id: self.poll_id.clone(),
                    done: self.done,
                };
                row.with("messageid", poll.to_cell())
            }
        }
    }

    /// `validated ∧ ¬votingPut`
    pub fn is_new_proposal(&self) -> bool {
        self.validated && !self.voting_put
    }

    /// `votingPut ∧ ¬done`
    pub fn is_live(&self) -> bool {
        self.voting_put && !self.done
    }

    /// Persisted part of the lifecycle. `Closing` only exists in memory.
    pub fn state(&self) -> ProposalState {
        if self.done {
            ProposalState::Closed
        } else if self.voting_put {
            ProposalState::PollOpen
        } else {
            ProposalState::Proposed
        }
    }

    /// Equality over the human-edited fields only. Tallies, result and timing
    /// change on every poll update and must not count as an edit.
    pub fn same_tracked_fields(&self, other: &ProposalRow) -> bool {
        self.invited_by == other.invited_by
            && self.user_invited == other.user_invited
            && self.name == other.name
            && self.email == other.email
            && self.info == other.info
    }

    pub fn outcome(&self) -> (OutcomeCode, bool) {
        OutcomeCode::normalize(&self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn alice() -> SheetRow {
        SheetRow::new(2)
            .with("name", "Alice")
            .with("invitedby", "Bob")
            .with("validated", "TRUE")
            .with("votingput", "FALSE")
    }

    #[rstest]
    #[case::upper(" TRUE ", true)]
    #[case::lower("true", true)]
    #[case::one("1", true)]
    #[case::yes("yes", false)]
    #[case::empty("", false)]
    #[case::zero("0", false)]
    fn spreadsheet_booleans(#[case] cell: &str, #[case] expected: bool) {
        assert_eq!(is_true(cell), expected);
    }

    #[test]
    fn parses_fresh_proposal_leniently() {
        let sheet = alice().with("vote.accept", "n/a");
        let row = ProposalRow::from_sheet_row(&sheet, SchemaVersion::NewMember);
        assert_eq!(row.name, "Alice");
        assert!(row.is_new_proposal());
        assert!(!row.is_live());
        assert_eq!(row.poll_id, None);
        assert_eq!(row.time_start, None);
        assert_eq!(row.tally.get(TallyField::Accept), 0);
        assert_eq!(row.state(), ProposalState::Proposed);
    }

    #[test]
    fn writes_back_owned_columns_only() {
        let mut row = ProposalRow::from_sheet_row(&alice(), SchemaVersion::NewMember);
        row.voting_put = true;
        row.poll_id = Some(PollId::new("p1"));
        row.message_id1 = Some(MessageId::new("10"));
        row.message_id2 = Some(MessageId::new("11"));
        row.time_start = Some(1_700_000_000);
        row.tally.set(TallyField::Accept, 3);

        let out = row.to_sheet_row(SchemaVersion::NewMember);
        assert_eq!(out.get("votingput"), "TRUE");
        assert_eq!(out.get("done"), "FALSE");
        assert_eq!(out.get("pollid"), "p1");
        assert_eq!(out.get("messageid2"), "11");
        assert_eq!(out.get("timestart"), "1700000000");
        assert_eq!(out.get("vote.accept"), "3");
        assert!(!out.cells.contains_key("name"));
        assert!(!out.cells.contains_key("validated"));

        let reparsed = ProposalRow::from_sheet_row(&out, SchemaVersion::NewMember);
        assert_eq!(reparsed.state(), ProposalState::PollOpen);
    }

    #[test]
    fn general_schema_keeps_poll_message_in_single_column() {
        let sheet = alice().with("messageid", "99");
        let row = ProposalRow::from_sheet_row(&sheet, SchemaVersion::General);
        assert_eq!(row.message_id1, None);
        assert_eq!(row.message_id2, Some(MessageId::new("99")));
        assert_eq!(row.poll_id, None);
        assert_eq!(row.to_sheet_row(SchemaVersion::General).get("messageid"), "99");
    }

    #[test]
    fn general_schema_carries_poll_and_closure_in_message_cell() {
        let sheet = alice()
            .with("votingput", "TRUE")
            .with("done", "TRUE")
            .with("messageid", "99:5012");
        let mut row = ProposalRow::from_sheet_row(&sheet, SchemaVersion::General);
        assert_eq!(row.poll_id, Some(PollId::new("5012")));
        // a stray `done` column is not part of this layout
        assert_eq!(row.state(), ProposalState::PollOpen);

        row.done = true;
        let out = row.to_sheet_row(SchemaVersion::General);
        assert_eq!(out.get("messageid"), "99:5012:done");
        assert!(!out.cells.contains_key("done"));
        assert!(!out.cells.contains_key("pollid"));

        let reparsed = ProposalRow::from_sheet_row(&out, SchemaVersion::General);
        assert_eq!(reparsed.state(), ProposalState::Closed);
        assert_eq!(reparsed.message_id2, Some(MessageId::new("99")));
    }

    #[rstest]
    #[case::blank("", PollRef::default())]
    #[case::message_only(" 7 ", PollRef { message_id: Some(MessageId::new("7")), ..PollRef::default() })]
    #[case::open("7:p", PollRef { message_id: Some(MessageId::new("7")), poll_id: Some(PollId::new("p")), done: false })]
    #[case::closed("7:p:done", PollRef { message_id: Some(MessageId::new("7")), poll_id: Some(PollId::new("p")), done: true })]
    fn poll_ref_cells(#[case] cell: &str, #[case] expected: PollRef) {
        assert_eq!(PollRef::parse(cell), expected);
    }

    #[test]
    fn tracked_fields_ignore_votes_and_timing() {
        let a = ProposalRow::from_sheet_row(&alice(), SchemaVersion::NewMember);
        let mut b = a.clone();
        b.tally.set(TallyField::Decline, 7);
        b.result = "WAIT_DECLINE".into();
        b.time_start = Some(5);
        assert!(a.same_tracked_fields(&b));

        b.info = "new info".into();
        assert!(!a.same_tracked_fields(&b));
    }
}
