//! Sheet schema: which header columns the core needs.

use serde::{Deserialize, Serialize};

use super::errors::SyncError;
use super::tally::PollKind;

/// Columns shared by every schema version.
const BASE_COLUMNS: &[&str] = &[
    "invitedby",
    "userinvited",
    "name",
    "email",
    "info",
    "validated",
    "votingput",
    "timestart",
    "vote.confirm",
    "vote.accept",
    "vote.decline",
    "vote.neutral",
    "vote.total",
    "vote.result",
];

/// Layout of the proposals sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaVersion {
    /// Announcement message + poll message (`messageid1`, `messageid2`).
    #[default]
    NewMember,
    /// Poll message only. `messageid` also carries the poll id and the
    /// closed mark, there are no `pollid` / `done` columns.
    General,
}

impl SchemaVersion {
    pub fn required_columns(self) -> Vec<&'static str> {
        let mut columns = BASE_COLUMNS.to_vec();
        match self {
            SchemaVersion::NewMember => {
                columns.extend(["done", "pollid", "messageid1", "messageid2"])
            }
            SchemaVersion::General => columns.push("messageid"),
        }
        columns
    }

    pub fn poll_kind(self) -> PollKind {
        match self {
            SchemaVersion::NewMember => PollKind::NewMember,
            SchemaVersion::General => PollKind::General,
        }
    }

    /// Check the sheet header row and report *all* missing columns at once.
    pub fn validate_headers<S: AsRef<str>>(self, headers: &[S]) -> Result<(), SyncError> {
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|required| !headers.iter().any(|h| h.as_ref().trim() == *required))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::MissingColumns(missing))
        }
    }
}
