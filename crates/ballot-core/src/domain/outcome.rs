//! Outcome model: the result code of a vote.
//!
//! Stored verbatim in the `vote.result` column, so the serialized form is the
//! SCREAMING_SNAKE_CASE code: FASTACCEPT / WAIT_ACCEPT / WAIT_DECLINE.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeCode {
    /// Overwhelming early majority: close the poll right now.
    #[serde(rename = "FASTACCEPT")]
    FastAccept,
    /// Accept once the voting window is over.
    #[serde(rename = "WAIT_ACCEPT")]
    WaitAccept,
    /// Decline once the voting window is over.
    #[serde(rename = "WAIT_DECLINE")]
    WaitDecline,
}

impl OutcomeCode {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeCode::FastAccept => "FASTACCEPT",
            OutcomeCode::WaitAccept => "WAIT_ACCEPT",
            OutcomeCode::WaitDecline => "WAIT_DECLINE",
        }
    }

    pub fn is_accepting(self) -> bool {
        matches!(self, OutcomeCode::FastAccept | OutcomeCode::WaitAccept)
    }

    /// Status word used in close messages.
    pub fn status_word(self) -> &'static str {
        if self.is_accepting() {
            "Accepting"
        } else {
            "Declining"
        }
    }

    /// Parse a raw result, falling back to WAIT_DECLINE for empty or
    /// unrecognized values. The second element is false when the fallback
    /// was taken so callers can warn about it.
    pub fn normalize(raw: &str) -> (OutcomeCode, bool) {
        match raw.parse() {
            Ok(code) => (code, true),
            Err(_) => (OutcomeCode::WaitDecline, false),
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outcome code `{0}`")]
pub struct UnknownOutcome(pub String);

impl FromStr for OutcomeCode {
    type Err = UnknownOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FASTACCEPT" => Ok(OutcomeCode::FastAccept),
            "WAIT_ACCEPT" => Ok(OutcomeCode::WaitAccept),
            "WAIT_DECLINE" => Ok(OutcomeCode::WaitDecline),
            other => Err(UnknownOutcome(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::fast("FASTACCEPT", OutcomeCode::FastAccept, true)]
    #[case::wait_accept(" WAIT_ACCEPT ", OutcomeCode::WaitAccept, true)]
    #[case::wait_decline("WAIT_DECLINE", OutcomeCode::WaitDecline, true)]
    #[case::empty("", OutcomeCode::WaitDecline, false)]
    #[case::garbage("MAYBE", OutcomeCode::WaitDecline, false)]
    #[case::lowercase("fastaccept", OutcomeCode::WaitDecline, false)]
    fn normalize_falls_back_to_decline(
        #[case] raw: &str,
        #[case] expected: OutcomeCode,
        #[case] recognized: bool,
    ) {
        assert_eq!(OutcomeCode::normalize(raw), (expected, recognized));
    }

    #[test]
    fn serializes_as_sheet_code() {
        let json = serde_json::to_string(&OutcomeCode::WaitAccept).unwrap();
        assert_eq!(json, "\"WAIT_ACCEPT\"");
        assert_eq!(OutcomeCode::FastAccept.status_word(), "Accepting");
        assert_eq!(OutcomeCode::WaitDecline.status_word(), "Declining");
    }
}
