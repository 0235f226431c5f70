//! Text helpers for chat messages (HTML parse mode).

use std::time::Duration;

use crate::domain::{OutcomeCode, ProposalRow};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `bob` -> `@bob`; already prefixed or empty handles are kept.
pub fn telegram_username(handle: &str) -> String {
    let handle = handle.trim();
    if handle.is_empty() || handle.starts_with('@') {
        handle.to_string()
    } else {
        format!("@{handle}")
    }
}

/// `60s` -> `1 minute`, `7500s` -> `2 hours 5 minutes`.
pub fn timeout_string(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let mut parts = Vec::new();
    for (unit, size) in [("day", 86_400), ("hour", 3_600), ("minute", 60), ("second", 1)] {
        let n = secs / size;
        secs %= size;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {unit}{plural}"));
        }
    }
    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}

/// Link to one row of the sheet, if the sheet link is configured.
pub fn row_link(sheet_link: Option<&str>, row_number: u32) -> Option<String> {
    sheet_link.map(|link| format!("{link}&range={row_number}:{row_number}"))
}

pub fn row_link_html(sheet_link: Option<&str>, row: &ProposalRow) -> String {
    let mut label = format!("Row #{}", row.row_number);
    if !row.name.is_empty() {
        label.push_str(&format!(" ({})", escape_html(&row.name)));
    }
    match row_link(sheet_link, row.row_number) {
        Some(href) => format!("<a href=\"{}\">{label}</a>", escape_html(&href)),
        None => label,
    }
}

/// Announcement text for a proposal.
pub fn info_text(sheet_link: Option<&str>, row: &ProposalRow) -> String {
    let mut text = format!("<b>{}</b>", escape_html(&row.name));
    if !row.user_invited.is_empty() {
        text.push_str(&format!(" ({})", escape_html(&row.user_invited)));
    }
    text.push('\n');
    text.push_str(&escape_html(&row.info));
    text.push_str("\n\n<i>");
    match row_link(sheet_link, row.row_number) {
        Some(href) => text.push_str(&format!(
            "<a href=\"{}\">Link to the spreadsheet</a>",
            escape_html(&href)
        )),
        None => text.push_str(&format!("Row #{}", row.row_number)),
    }
    if !row.invited_by.is_empty() {
        text.push_str(&format!(
            " (Invited by {})",
            telegram_username(&escape_html(&row.invited_by))
        ));
    }
    text.push_str("</i>");
    text
}

pub fn poll_question(row: &ProposalRow) -> String {
    format!("{}: accept into the community?", row.name)
}

/// Message posted when a poll is stopped.
pub fn close_reason(
    outcome: OutcomeCode,
    row: &ProposalRow,
    admin: Option<&str>,
    window: Duration,
    sheet_link: Option<&str>,
) -> String {
    let admin = admin
        .map(|a| telegram_username(&escape_html(a)))
        .unwrap_or_default();
    let mut inviter = telegram_username(&escape_html(&row.invited_by));
    if inviter == admin {
        inviter.clear();
    }

    let window = timeout_string(window);
    let (sentence, mentions) = match outcome {
        OutcomeCode::FastAccept => (
            "Voting is resolved instantly with a positive result, new member is accepted.".to_string(),
            vec![admin, inviter],
        ),
        OutcomeCode::WaitAccept => (
            format!("After {window} from the voting, new member is accepted."),
            vec![admin, inviter],
        ),
        OutcomeCode::WaitDecline => (
            format!("After {window} from the voting, new member is rejected."),
            vec![admin],
        ),
    };

    let mut reason = sentence;
    for mention in mentions.into_iter().filter(|m| !m.is_empty()) {
        reason.push(' ');
        reason.push_str(&mention);
    }
    format!(
        "{reason}\n<i>{} <b>{}</b></i>",
        row_link_html(sheet_link, row),
        outcome.status_word()
    )
}
