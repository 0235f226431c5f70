//! Vote tallies and the poll option label table.
//!
//! The sheet stores one column per option (`vote.confirm`, `vote.accept`, ...).
//! Poll updates only carry option *labels*, so every label has to be mapped
//! back to a tally field before it can be written.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// One votable option column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TallyField {
    Confirm,
    Accept,
    Decline,
    Neutral,
}

impl TallyField {
    pub const ALL: [TallyField; 4] = [
        TallyField::Confirm,
        TallyField::Accept,
        TallyField::Decline,
        TallyField::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TallyField::Confirm => "confirm",
            TallyField::Accept => "accept",
            TallyField::Decline => "decline",
            TallyField::Neutral => "neutral",
        }
    }

    /// Sheet column holding this tally.
    pub fn column(self) -> &'static str {
        match self {
            TallyField::Confirm => "vote.confirm",
            TallyField::Accept => "vote.accept",
            TallyField::Decline => "vote.decline",
            TallyField::Neutral => "vote.neutral",
        }
    }
}

impl fmt::Display for TallyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current vote counts of one proposal.
///
/// `total` is the member count of the chat at the time of the last poll
/// update, not the sum of the option counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    counts: BTreeMap<TallyField, u32>,
    pub total: u32,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: TallyField) -> u32 {
        self.counts.get(&field).copied().unwrap_or(0)
    }

    pub fn set(&mut self, field: TallyField, count: u32) {
        self.counts.insert(field, count);
    }

    pub fn with(mut self, field: TallyField, count: u32) -> Self {
        self.set(field, count);
        self
    }

    pub fn with_total(mut self, total: u32) -> Self {
        self.total = total;
        self
    }

    /// Sum of all option counts.
    pub fn votes(&self) -> u32 {
        self.counts.values().sum()
    }
}

/// Which option set a poll uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PollKind {
    /// confirm / accept / decline / neutral
    NewMember,
    /// accept / decline
    General,
}

impl PollKind {
    pub fn fields(self) -> &'static [TallyField] {
        match self {
            PollKind::NewMember => &TallyField::ALL,
            PollKind::General => &[TallyField::Accept, TallyField::Decline],
        }
    }
}

/// Bidirectional mapping between option labels shown in the chat and tally
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    kind: PollKind,
    labels: BTreeMap<TallyField, String>,
}

impl LabelTable {
    /// Labels used by default for the given poll kind.
    pub fn for_kind(kind: PollKind) -> Self {
        let labels = match kind {
            PollKind::NewMember => vec![
                (TallyField::Confirm, "I know this person and vouch for them"),
                (TallyField::Accept, "Accept"),
                (TallyField::Decline, "Decline"),
                (TallyField::Neutral, "Neutral"),
            ],
            PollKind::General => vec![
                (TallyField::Accept, "Accept"),
                (TallyField::Decline, "Decline"),
            ],
        };
        Self {
            kind,
            labels: labels
                .into_iter()
                .map(|(field, label)| (field, label.to_string()))
                .collect(),
        }
    }

    /// Build a table from custom labels.
    ///
    /// Every field of `kind` needs exactly one non-empty label and labels must
    /// be distinct, otherwise reverse lookup would be ambiguous.
    pub fn custom(
        kind: PollKind,
        labels: impl IntoIterator<Item = (TallyField, String)>,
    ) -> Result<Self, SyncError> {
        let labels: BTreeMap<TallyField, String> = labels.into_iter().collect();
        for field in kind.fields() {
            match labels.get(field) {
                Some(label) if !label.trim().is_empty() => {}
                _ => {
                    return Err(SyncError::InvalidLabels(format!("no label for {field}")));
                }
            }
        }
        if let Some(extra) = labels.keys().find(|f| !kind.fields().contains(*f)) {
            return Err(SyncError::InvalidLabels(format!(
                "{extra} is not an option of a {kind:?} poll"
            )));
        }
        let mut seen: Vec<&str> = labels.values().map(String::as_str).collect();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(SyncError::InvalidLabels(format!("duplicate label `{}`", pair[0])));
        }
        Ok(Self { kind, labels })
    }

    pub fn kind(&self) -> PollKind {
        self.kind
    }

    /// Option labels in poll order.
    pub fn options(&self) -> Vec<String> {
        self.kind
            .fields()
            .iter()
            .filter_map(|f| self.labels.get(f).cloned())
            .collect()
    }

    pub fn label(&self, field: TallyField) -> Option<&str> {
        self.labels.get(&field).map(String::as_str)
    }

    /// Reverse lookup: option text -> tally field.
    pub fn field_for(&self, label: &str) -> Result<TallyField, SyncError> {
        self.labels
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(field, _)| *field)
            .ok_or_else(|| SyncError::UnknownLabel(label.to_string()))
    }
}
