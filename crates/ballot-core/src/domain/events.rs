//! Events - 外部から流れてくるイベント
//!
//! - SheetEvent: refresh ごとに ChangeDetector が生成する
//! - ChatEvent: チャットプラットフォームから届く（poll 更新、bot 追加）

use serde::{Deserialize, Serialize};

use super::ids::{ChatId, PollId};
use super::row::ProposalRow;

/// Event produced by one refresh of the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetEvent {
    /// First successful read since startup.
    FirstLoad(Vec<ProposalRow>),
    /// Tracked fields of a row changed between two snapshots.
    Edited {
        current: ProposalRow,
        previous: ProposalRow,
    },
    /// A validated row without a poll.
    NewProposal(ProposalRow),
}

/// One option of a poll as seen by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub voter_count: u32,
}

impl PollOption {
    pub fn new(label: impl Into<String>, voter_count: u32) -> Self {
        Self {
            label: label.into(),
            voter_count,
        }
    }
}

/// Read-only poll state delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub poll_id: PollId,
    pub options: Vec<PollOption>,
    pub is_closed: bool,
    /// Chat member count when the snapshot was taken.
    pub total_members: u32,
}

/// Event delivered by the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    PollUpdate(PollSnapshot),
    BotAdded { chat_id: ChatId, title: Option<String> },
}
