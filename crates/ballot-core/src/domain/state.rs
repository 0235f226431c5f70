//! Proposal lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of one proposal.
///
/// State transitions:
/// - Proposed -> PollOpen (new-proposal event, poll opened)
/// - PollOpen -> PollOpen (live vote update)
/// - PollOpen -> Closing -> Closed (voting window elapsed, or FASTACCEPT)
///
/// `Closing` is never persisted: the sheet only knows `votingput`/`done`.
/// It guards against a second close while the first is still talking to the
/// chat. Closure timers are never cancelled; a late timer finds the proposal
/// `Closing` or `Closed` and does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    Proposed,
    PollOpen,
    Closing,
    Closed,
}

impl ProposalState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ProposalState::Closed)
    }

    /// Can a close transition start from here?
    pub fn can_close(self) -> bool {
        matches!(self, ProposalState::PollOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_polls_can_start_closing() {
        assert!(ProposalState::PollOpen.can_close());
        assert!(!ProposalState::Closing.can_close());
        assert!(!ProposalState::Closed.can_close());
        assert!(!ProposalState::Proposed.can_close());
        assert!(ProposalState::Closed.is_terminal());
    }
}
