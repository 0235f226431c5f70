//! Proposal change detector.
//!
//! Compares two consecutive generations and classifies rows:
//! 1. edit pass: same row number, tracked fields differ -> `Edited`, and the
//!    row leaves the suppression set;
//! 2. new-proposal pass: `validated ∧ ¬votingPut` and not suppressed ->
//!    `NewProposal`, and the row enters the suppression set.
//!
//! The suppression set lives here and nowhere else.

use std::collections::{HashMap, HashSet};

use crate::domain::{ProposalRow, SheetEvent};

#[derive(Debug, Default)]
pub struct ChangeDetector {
    suppressed: HashSet<u32>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suppressed(&self, row_number: u32) -> bool {
        self.suppressed.contains(&row_number)
    }

    /// Run both passes over one generation. Edit events come first.
    pub fn detect(&mut self, current: &[ProposalRow], previous: &[ProposalRow]) -> Vec<SheetEvent> {
        let previous: HashMap<u32, &ProposalRow> =
            previous.iter().map(|row| (row.row_number, row)).collect();

        let mut events = Vec::new();
        for row in current {
            let Some(prev) = previous.get(&row.row_number) else {
                continue;
            };
            if !row.same_tracked_fields(prev) {
                self.suppressed.remove(&row.row_number);
                events.push(SheetEvent::Edited {
                    current: row.clone(),
                    previous: (*prev).clone(),
                });
            }
        }

        for row in current {
            if row.is_new_proposal() && self.suppressed.insert(row.row_number) {
                events.push(SheetEvent::NewProposal(row.clone()));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TallyField;

    fn proposal(n: u32) -> ProposalRow {
        ProposalRow {
            row_number: n,
            name: "Alice".into(),
            invited_by: "Bob".into(),
            validated: true,
            ..Default::default()
        }
    }

    fn kinds(events: &[SheetEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                SheetEvent::FirstLoad(_) => "first",
                SheetEvent::Edited { .. } => "edit",
                SheetEvent::NewProposal(_) => "new",
            })
            .collect()
    }

    #[test]
    fn new_proposal_fires_once_across_cycles() {
        let mut detector = ChangeDetector::new();
        let rows = vec![proposal(2)];

        assert_eq!(kinds(&detector.detect(&rows, &[])), ["new"]);
        assert!(detector.is_suppressed(2));
        for _ in 0..5 {
            assert!(detector.detect(&rows, &rows).is_empty());
        }
    }

    #[test]
    fn unvalidated_or_opened_rows_never_fire() {
        let mut detector = ChangeDetector::new();
        let mut draft = proposal(2);
        draft.validated = false;
        let mut opened = proposal(3);
        opened.voting_put = true;

        assert!(detector.detect(&[draft, opened], &[]).is_empty());
    }

    #[test]
    fn non_tracked_changes_are_not_edits() {
        let mut detector = ChangeDetector::new();
        let mut before = proposal(2);
        before.voting_put = true;
        let mut after = before.clone();
        after.tally.set(TallyField::Accept, 4);
        after.tally.total = 9;
        after.result = "WAIT_ACCEPT".into();
        after.time_start = Some(1_700_000_000);
        after.done = true;

        assert!(detector.detect(&[after], &[before]).is_empty());
    }

    #[test]
    fn edit_fires_before_new_proposal_and_clears_suppression() {
        let mut detector = ChangeDetector::new();
        let first = vec![proposal(2)];
        detector.detect(&first, &[]);

        let mut edited = proposal(2);
        edited.info = "now with info".into();
        let events = detector.detect(&[edited.clone()], &first);
        assert_eq!(kinds(&events), ["edit", "new"]);
        match &events[0] {
            SheetEvent::Edited { current, previous } => {
                assert_eq!(current.info, "now with info");
                assert_eq!(previous.info, "");
            }
            other => panic!("unexpected {other:?}"),
        }

        // same generation again: suppressed once more
        assert!(detector.detect(&[edited.clone()], &[edited]).is_empty());
    }

    #[test]
    fn rows_without_previous_generation_produce_no_edit() {
        let mut detector = ChangeDetector::new();
        let mut opened = proposal(7);
        opened.voting_put = true;
        let other = proposal(8);
        let mut other_prev = other.clone();
        other_prev.name = "Alicia".into();
        other_prev.voting_put = true;
        let mut other_now = other;
        other_now.voting_put = true;

        let events = detector.detect(&[opened, other_now], &[other_prev]);
        assert_eq!(kinds(&events), ["edit"]);
    }
}
