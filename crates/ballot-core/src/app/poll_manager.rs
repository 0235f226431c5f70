//! PollManager - proposal のライフサイクル（Proposed → PollOpen → Closing → Closed）
//!
//! # 設計原則
//! - 行は毎回ストアから引き直す（スケジュール時の参照を信用しない）
//! - close は冪等: `done=true` の行に対しては何もしない
//! - close タイマーはキャンセルしない。遅れて発火したタイマーは上の冪等ガードで無害になる
//! - 生きている行の read-modify-write（投票更新と close）は `row_lock` で直列化する。
//!   排他は RequestOrder だけ、という前提からは意図的に外れている: これがないと
//!   投票更新の古い保存が close の `done=true` を上書きしうる
//! - 期限切れの poll も timer と同じく `timepassed=true` で結果を計算し直して close する
//! - timer 経由の close は stop の前に `done=true` を保存する。stop が失敗すると
//!   チャットの poll は開いたまま残り、再起動しても拾われない（報告だけされる）
//!
//! # Fast accept
//! 投票途中の集計（timepassed=false）で FASTACCEPT が出たら、その場で close する。
//! 早い段階での圧倒的多数で締め切るのか、遅れてきた投票者との競合なのかは
//! 運用側の判断事項（DESIGN.md 参照）。挙動はそのまま残している。

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::reporter::Reporter;
use crate::app::stopped;
use crate::app::text;
use crate::domain::{
    ChatEvent, ChatId, LabelTable, OutcomeCode, PollId, PollKind, PollSnapshot, ProposalRow,
    ProposalState, SheetEvent, SyncError,
};
use crate::ports::{ChatClient, Clock, OutcomeEvaluator};
use crate::sheet::Spreadsheet;

/// Static settings of the manager.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub chat_id: ChatId,
    /// Voting window.
    pub poll_timeout: Duration,
    /// Admin handle mentioned in close messages.
    pub admin: Option<String>,
    pub sheet_link: Option<String>,
    pub labels: LabelTable,
}

pub struct PollManager {
    sheet: Arc<Spreadsheet>,
    chat: Arc<dyn ChatClient>,
    evaluator: Arc<dyn OutcomeEvaluator>,
    clock: Arc<dyn Clock>,
    reporter: Arc<Reporter>,
    settings: PollSettings,
    row_lock: tokio::sync::Mutex<()>,
    /// Polls with a close in progress (the in-memory `Closing` state).
    closing: Mutex<HashSet<PollId>>,
    armed_timers: AtomicUsize,
    shutdown: watch::Sender<bool>,
}

/// Marks a poll `Closing` until dropped.
struct ClosingGuard<'a> {
    set: &'a Mutex<HashSet<PollId>>,
    poll_id: PollId,
}

impl<'a> ClosingGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<PollId>>, poll_id: &PollId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(poll_id.clone());
        inserted.then(|| Self {
            set,
            poll_id: poll_id.clone(),
        })
    }
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.poll_id);
    }
}

impl PollManager {
    pub fn new(
        sheet: Arc<Spreadsheet>,
        chat: Arc<dyn ChatClient>,
        evaluator: Arc<dyn OutcomeEvaluator>,
        clock: Arc<dyn Clock>,
        reporter: Arc<Reporter>,
        settings: PollSettings,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sheet,
            chat,
            evaluator,
            clock,
            reporter,
            settings,
            row_lock: tokio::sync::Mutex::new(()),
            closing: Mutex::new(HashSet::new()),
            armed_timers: AtomicUsize::new(0),
            shutdown,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    fn link(&self) -> Option<&str> {
        self.settings.sheet_link.as_deref()
    }

    fn is_closing(&self, poll_id: &PollId) -> bool {
        self.closing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(poll_id)
    }

    /// Lifecycle state of the proposal behind `poll_id`, including the
    /// in-memory `Closing` state.
    pub async fn state(&self, poll_id: &PollId) -> Option<ProposalState> {
        if self.is_closing(poll_id) {
            return Some(ProposalState::Closing);
        }
        self.sheet.find_by_poll_id(poll_id).await.map(|row| row.state())
    }

    /// Close timers that have not fired yet.
    pub fn armed_timers(&self) -> usize {
        self.armed_timers.load(Ordering::SeqCst)
    }

    /// Drop pending close timers. The polls stay open and are picked up by
    /// the first-load reconciliation of the next start.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Dispatch one sheet event; failures go to the reporter.
    pub async fn on_sheet_event(self: &Arc<Self>, event: SheetEvent) {
        match event {
            SheetEvent::FirstLoad(rows) => self.resume(rows).await,
            SheetEvent::Edited { current, previous } => {
                if let Err(err) = self.on_edit(&current, &previous).await {
                    self.reporter.failure("updating announcement", &err).await;
                }
            }
            SheetEvent::NewProposal(row) => {
                if let Err(err) = self.on_new_proposal(row).await {
                    self.reporter.failure("opening poll", &err).await;
                }
            }
        }
    }

    /// Dispatch one chat event; failures go to the reporter.
    pub async fn on_chat_event(self: &Arc<Self>, event: ChatEvent) {
        match event {
            ChatEvent::PollUpdate(snapshot) => {
                if let Err(err) = self.on_poll_update(snapshot).await {
                    self.reporter.failure("poll update", &err).await;
                }
            }
            ChatEvent::BotAdded { chat_id, title } => {
                info!(
                    chat_id = chat_id.get(),
                    title = title.as_deref().unwrap_or("(no name)"),
                    "bot was added to a chat; put this chat id in the config to use it"
                );
            }
        }
    }

    /// `Proposed -> PollOpen`.
    pub async fn on_new_proposal(self: &Arc<Self>, row: ProposalRow) -> Result<(), SyncError> {
        if row.name.trim().is_empty() || row.invited_by.trim().is_empty() {
            return Err(SyncError::InvalidRow {
                row: row.row_number,
                message: "has no name or invitedby values".into(),
            });
        }

        // The event may be older than the store.
        let mut row = self
            .sheet
            .find_by_row_number(row.row_number)
            .await
            .ok_or(SyncError::RowNotFound(row.row_number))?;
        if !row.is_new_proposal() {
            debug!(row = row.row_number, "proposal already has a poll");
            return Ok(());
        }

        let chat = self.settings.chat_id;
        let announcement = match self.settings.labels.kind() {
            PollKind::NewMember => Some(
                self.chat
                    .send_announcement(chat, &text::info_text(self.link(), &row))
                    .await?,
            ),
            PollKind::General => None,
        };
        let opened = self
            .chat
            .open_poll(chat, &text::poll_question(&row), &self.settings.labels.options())
            .await?;

        row.voting_put = true;
        row.done = false;
        row.poll_id = Some(opened.poll_id.clone());
        row.message_id1 = announcement;
        row.message_id2 = Some(opened.message_id);
        row.time_start = Some(opened.created_at.timestamp());
        self.sheet.save_row(&row).await?;

        self.reporter
            .log(&format!(
                "Opened new voting for {}.",
                text::row_link_html(self.link(), &row)
            ))
            .await;
        self.schedule_close(opened.poll_id, self.settings.poll_timeout);
        Ok(())
    }

    /// First-load reconciliation of polls that were open before the restart.
    pub async fn resume(self: &Arc<Self>, rows: Vec<ProposalRow>) {
        let now = self.clock.now_secs();
        let window = i64::try_from(self.settings.poll_timeout.as_secs()).unwrap_or(i64::MAX);

        for row in rows.into_iter().filter(ProposalRow::is_live) {
            let (Some(poll_id), Some(start)) = (row.poll_id.clone(), row.time_start) else {
                let err = SyncError::InvalidRow {
                    row: row.row_number,
                    message: "open poll without pollid or a valid timestart".into(),
                };
                self.reporter.failure("resuming poll", &err).await;
                continue;
            };

            let elapsed = now.saturating_sub(start);
            if elapsed > window {
                self.reporter
                    .log("Server startup: found unfinished poll, that should be closed.")
                    .await;
                if let Err(err) = self.close_poll(&poll_id, true).await {
                    self.reporter.failure("closing overdue poll", &err).await;
                }
            } else {
                let remaining = Duration::from_secs(u64::try_from(window - elapsed).unwrap_or(0));
                self.reporter
                    .log(&format!(
                        "Server startup: set timeout to finish poll ({}), {}",
                        text::row_link_html(self.link(), &row),
                        text::timeout_string(remaining)
                    ))
                    .await;
                self.schedule_close(poll_id, remaining);
            }
        }
    }

    /// Refresh the announcement of a live poll after its row was edited.
    pub async fn on_edit(&self, current: &ProposalRow, previous: &ProposalRow) -> Result<(), SyncError> {
        if !current.is_live() || current.same_tracked_fields(previous) {
            return Ok(());
        }
        let Some(message) = &current.message_id1 else {
            debug!(row = current.row_number, "live poll has no announcement to edit");
            return Ok(());
        };
        self.reporter
            .log(&format!(
                "Noticed row edit on live poll: {}",
                text::row_link_html(self.link(), current)
            ))
            .await;
        self.chat
            .edit_message(
                self.settings.chat_id,
                message,
                &text::info_text(self.link(), current),
            )
            .await
    }

    /// `PollOpen -> PollOpen` with fresh tallies; FASTACCEPT closes right away.
    pub async fn on_poll_update(self: &Arc<Self>, snapshot: PollSnapshot) -> Result<(), SyncError> {
        if snapshot.is_closed {
            return Ok(());
        }
        if self.is_closing(&snapshot.poll_id) {
            debug!(poll_id = %snapshot.poll_id, "poll is closing, update dropped");
            return Ok(());
        }

        let mut counts = Vec::with_capacity(snapshot.options.len());
        for option in &snapshot.options {
            match self.settings.labels.field_for(&option.label) {
                Ok(field) => counts.push((field, option.voter_count)),
                Err(err) => self.reporter.failure("poll update", &err).await,
            }
        }
        let total = if snapshot.total_members > 0 {
            snapshot.total_members
        } else {
            self.chat.member_count(self.settings.chat_id).await?
        };

        let outcome = {
            let _rows = self.row_lock.lock().await;
            let mut row = self
                .sheet
                .find_by_poll_id(&snapshot.poll_id)
                .await
                .ok_or_else(|| SyncError::PollNotFound(snapshot.poll_id.clone()))?;
            if row.done {
                return Err(SyncError::InvalidRow {
                    row: row.row_number,
                    message: "received poll update after the proposal was closed".into(),
                });
            }

            for (field, count) in &counts {
                row.tally.set(*field, *count);
            }
            row.tally.total = total;
            let outcome = self.evaluator.evaluate(&row.tally, false);
            row.result = outcome.as_str().to_string();
            self.sheet.save_row(&row).await?;

            let summary: Vec<String> = counts
                .iter()
                .map(|(field, count)| format!("{field}: {count}"))
                .collect();
            self.reporter
                .log(&format!(
                    "Poll updated ({}): {}",
                    summary.join(", "),
                    text::row_link_html(self.link(), &row)
                ))
                .await;
            outcome
        };

        if outcome == OutcomeCode::FastAccept {
            self.close_poll(&snapshot.poll_id, false).await?;
        }
        Ok(())
    }

    /// `PollOpen -> Closing -> Closed`. No-op for closed or closing polls.
    ///
    /// With `calculate_result` the outcome is recomputed with
    /// `timepassed=true` and `done` is saved before the poll is stopped.
    /// Without it the stored result is announced and `done` is saved only
    /// after the poll was stopped, so a failed stop leaves the row open.
    pub async fn close_poll(&self, poll_id: &PollId, calculate_result: bool) -> Result<(), SyncError> {
        let _rows = self.row_lock.lock().await;
        let mut row = self
            .sheet
            .find_by_poll_id(poll_id)
            .await
            .ok_or_else(|| SyncError::PollNotFound(poll_id.clone()))?;
        if !row.state().can_close() {
            debug!(poll_id = %poll_id, state = ?row.state(), "nothing to close");
            return Ok(());
        }
        let Some(_closing) = ClosingGuard::acquire(&self.closing, poll_id) else {
            return Ok(());
        };

        if calculate_result {
            row.done = true;
            row.result = self.evaluator.evaluate(&row.tally, true).as_str().to_string();
            self.sheet.save_row(&row).await?;
            row = self
                .sheet
                .find_by_poll_id(poll_id)
                .await
                .ok_or_else(|| SyncError::PollNotFound(poll_id.clone()))?;
        }

        let (outcome, recognized) = row.outcome();
        if !recognized {
            warn!(row = row.row_number, result = %row.result, fallback = %outcome, "unknown voting result");
        }
        let message = row.message_id2.clone().ok_or_else(|| SyncError::InvalidRow {
            row: row.row_number,
            message: "open poll without a poll message id".into(),
        })?;
        let reason = text::close_reason(
            outcome,
            &row,
            self.settings.admin.as_deref(),
            self.settings.poll_timeout,
            self.link(),
        );
        self.chat
            .stop_poll(self.settings.chat_id, &message, &reason)
            .await?;
        self.reporter
            .log(&format!(
                "Stopped poll: {}. Result: {outcome}",
                text::row_link_html(self.link(), &row)
            ))
            .await;

        if !calculate_result {
            row.done = true;
            row.result = outcome.as_str().to_string();
            self.sheet.save_row(&row).await?;
        }
        Ok(())
    }

    /// Arm a close timer. Timers are never cancelled individually.
    fn schedule_close(self: &Arc<Self>, poll_id: PollId, after: Duration) {
        let manager = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        self.armed_timers.fetch_add(1, Ordering::SeqCst);
        debug!(poll_id = %poll_id, after_secs = after.as_secs(), "close timer armed");

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => {
                    manager.armed_timers.fetch_sub(1, Ordering::SeqCst);
                    if let Err(err) = manager.close_poll(&poll_id, true).await {
                        manager.reporter.failure("closing poll", &err).await;
                    }
                }
                _ = stopped(&mut shutdown) => {
                    manager.armed_timers.fetch_sub(1, Ordering::SeqCst);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PollOption, SchemaVersion, SheetRow, TallyField};
    use crate::formula::{DEFAULT_FORMULA, FormulaEvaluator};
    use crate::impls::{ChatCall, InMemoryChat, InMemorySheet};
    use crate::ports::FixedClock;
    use crate::sheet::RequestOrder;

    const NOW: i64 = 1_700_000_000;
    const CHAT: i64 = -100;
    const CONFIRM: &str = "I know this person and vouch for them";

    struct Harness {
        client: Arc<InMemorySheet>,
        chat: Arc<InMemoryChat>,
        sheet: Arc<Spreadsheet>,
        manager: Arc<PollManager>,
    }

    impl Harness {
        fn new(schema: SchemaVersion, formula: &str) -> Self {
            let clock = Arc::new(FixedClock::at_secs(NOW));
            let client = Arc::new(InMemorySheet::new(schema));
            let chat = Arc::new(InMemoryChat::new(clock.clone()));
            chat.set_member_count(20);
            let sheet = Arc::new(Spreadsheet::new(
                client.clone(),
                RequestOrder::new(Duration::from_millis(1000)),
                schema,
            ));
            let settings = PollSettings {
                chat_id: ChatId::new(CHAT),
                poll_timeout: Duration::from_secs(60),
                admin: Some("@root".into()),
                sheet_link: None,
                labels: LabelTable::for_kind(schema.poll_kind()),
            };
            let manager = Arc::new(PollManager::new(
                sheet.clone(),
                chat.clone(),
                Arc::new(FormulaEvaluator::parse(formula).unwrap()),
                clock,
                Arc::new(Reporter::tracing_only()),
                settings,
            ));
            Self {
                client,
                chat,
                sheet,
                manager,
            }
        }

        async fn refresh(&self) {
            for event in self.sheet.refresh().await.unwrap() {
                self.manager.on_sheet_event(event).await;
            }
        }

        async fn only_poll_id(&self) -> PollId {
            match self.chat.opened_polls().as_slice() {
                [ChatCall::OpenPoll { poll_id, .. }] => poll_id.clone(),
                other => panic!("expected one poll, got {other:?}"),
            }
        }

        fn cell(&self, row: u32, column: &str) -> String {
            self.client.row(row).unwrap().get(column).to_string()
        }
    }

    fn proposal(row: u32) -> SheetRow {
        SheetRow::new(row)
            .with("name", "Alice")
            .with("invitedby", "Bob")
            .with("validated", "TRUE")
            .with("votingput", "FALSE")
            .with("done", "FALSE")
    }

    fn live_row(row: u32, poll_id: &str, time_start: i64) -> SheetRow {
        proposal(row)
            .with("votingput", "TRUE")
            .with("pollid", poll_id)
            .with("messageid1", "10")
            .with("messageid2", "11")
            .with("timestart", time_start.to_string())
    }

    fn snapshot(poll_id: &PollId, options: &[(&str, u32)]) -> PollSnapshot {
        PollSnapshot {
            poll_id: poll_id.clone(),
            options: options.iter().map(|(l, n)| PollOption::new(*l, *n)).collect(),
            is_closed: false,
            total_members: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn new_proposal_opens_announcement_and_poll() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_DECLINE""#);
        h.client.put_row(proposal(2));
        h.refresh().await;

        let calls = h.chat.calls();
        assert!(matches!(&calls[0], ChatCall::Announcement { text, .. } if text.starts_with("<b>Alice</b>")));
        match &calls[1] {
            ChatCall::OpenPoll { question, options, .. } => {
                assert_eq!(question, "Alice: accept into the community?");
                assert_eq!(options.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }

        let poll_id = h.only_poll_id().await;
        assert_eq!(h.cell(2, "votingput"), "TRUE");
        assert_eq!(h.cell(2, "done"), "FALSE");
        assert_eq!(h.cell(2, "pollid"), poll_id.as_str());
        assert_eq!(h.cell(2, "messageid1"), "100");
        assert_eq!(h.cell(2, "messageid2"), "101");
        assert_eq!(h.cell(2, "timestart"), NOW.to_string());
        assert_eq!(h.manager.armed_timers(), 1);

        // later refreshes do not open a second poll
        h.refresh().await;
        h.refresh().await;
        assert_eq!(h.chat.opened_polls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn general_schema_opens_two_option_poll_without_announcement() {
        let h = Harness::new(SchemaVersion::General, r#""WAIT_DECLINE""#);
        h.client.put_row(proposal(3));
        h.refresh().await;

        let calls = h.chat.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], ChatCall::OpenPoll { options, .. } if options.len() == 2));
        let poll_id = h.only_poll_id().await;
        assert_eq!(h.cell(3, "messageid"), format!("100:{poll_id}"));

        h.manager.close_poll(&poll_id, true).await.unwrap();
        assert_eq!(h.cell(3, "messageid"), format!("100:{poll_id}:done"));
        assert_eq!(h.manager.state(&poll_id).await, Some(ProposalState::Closed));
        assert_eq!(h.chat.stop_reasons().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn proposal_without_inviter_is_rejected() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_DECLINE""#);
        h.client.put_row(proposal(2).with("invitedby", ""));
        h.sheet.refresh().await.unwrap();
        let row = h.sheet.find_by_row_number(2).await.unwrap();

        let err = h.manager.on_new_proposal(row).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidRow { row: 2, .. }));
        assert!(h.chat.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_update_writes_tallies_and_skips_unknown_labels() {
        let h = Harness::new(
            SchemaVersion::NewMember,
            r#"IF(accept > decline, "WAIT_ACCEPT", "WAIT_DECLINE")"#,
        );
        h.client.put_row(proposal(2));
        h.refresh().await;
        let poll_id = h.only_poll_id().await;

        let update = snapshot(&poll_id, &[("Accept", 3), ("Decline", 1), ("Maybe", 9)]);
        h.manager.on_poll_update(update).await.unwrap();

        assert_eq!(h.cell(2, "vote.accept"), "3");
        assert_eq!(h.cell(2, "vote.decline"), "1");
        assert_eq!(h.cell(2, "vote.total"), "20");
        assert_eq!(h.cell(2, "vote.result"), "WAIT_ACCEPT");
        assert_eq!(h.cell(2, "done"), "FALSE");
        assert!(h.chat.stop_reasons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_for_unknown_poll_is_a_lookup_error() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_DECLINE""#);
        h.sheet.refresh().await.unwrap();
        let err = h
            .manager
            .on_poll_update(snapshot(&PollId::new("ghost"), &[("Accept", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PollNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_accept_closes_immediately_and_late_timer_is_harmless() {
        let h = Harness::new(SchemaVersion::NewMember, r#"IF(confirm >= 2, "FASTACCEPT", "WAIT_DECLINE")"#);
        h.client.put_row(proposal(2));
        h.refresh().await;
        let poll_id = h.only_poll_id().await;

        h.manager
            .on_poll_update(snapshot(&poll_id, &[(CONFIRM, 2)]))
            .await
            .unwrap();
        assert_eq!(h.cell(2, "done"), "TRUE");
        assert_eq!(h.cell(2, "vote.result"), "FASTACCEPT");
        let reasons = h.chat.stop_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("resolved instantly"));
        assert!(reasons[0].contains("@root @Bob"));

        // the voting window timer still fires, and does nothing
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(h.manager.armed_timers(), 0);
        assert_eq!(h.chat.stop_reasons().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_twice_stops_the_poll_once() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_ACCEPT""#);
        h.client.put_row(live_row(2, "p-2", NOW - 10));
        h.sheet.refresh().await.unwrap();
        let poll_id = PollId::new("p-2");

        h.manager.close_poll(&poll_id, true).await.unwrap();
        h.manager.close_poll(&poll_id, true).await.unwrap();
        h.manager.close_poll(&poll_id, false).await.unwrap();

        assert_eq!(h.chat.stop_reasons().len(), 1);
        assert_eq!(h.cell(2, "done"), "TRUE");
        assert_eq!(h.manager.state(&poll_id).await, Some(ProposalState::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_closes_overdue_polls_immediately() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_ACCEPT""#);
        h.client.put_row(live_row(2, "p-2", NOW - 3600).with("vote.result", "WAIT_DECLINE"));
        h.refresh().await;

        let reasons = h.chat.stop_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("accepted"));
        assert_eq!(h.cell(2, "vote.result"), "WAIT_ACCEPT");
        assert_eq!(h.cell(2, "done"), "TRUE");
        assert_eq!(h.manager.armed_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_poll_is_decided_with_time_passed() {
        let h = Harness::new(SchemaVersion::NewMember, DEFAULT_FORMULA);
        // the live result was computed before the window ended
        h.client.put_row(
            live_row(2, "p-2", NOW - 3600)
                .with("vote.accept", "5")
                .with("vote.decline", "0")
                .with("vote.total", "20")
                .with("vote.result", "WAIT_DECLINE"),
        );
        h.refresh().await;

        let reasons = h.chat.stop_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("new member is accepted"), "{}", reasons[0]);
        assert_eq!(h.cell(2, "vote.result"), "WAIT_ACCEPT");
        assert_eq!(h.cell(2, "done"), "TRUE");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stop_on_timer_close_leaves_row_closed() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_ACCEPT""#);
        h.client.put_row(live_row(2, "p-2", NOW - 10));
        h.sheet.refresh().await.unwrap();
        let poll_id = PollId::new("p-2");

        h.chat.fail_stop_poll(true);
        let err = h.manager.close_poll(&poll_id, true).await.unwrap_err();
        assert!(matches!(err, SyncError::Chat(_)));
        assert_eq!(h.cell(2, "done"), "TRUE");
        assert_eq!(h.cell(2, "vote.result"), "WAIT_ACCEPT");
        assert_eq!(h.manager.state(&poll_id).await, Some(ProposalState::Closed));

        // neither a retry nor a restart stops the chat poll afterwards
        h.chat.fail_stop_poll(false);
        h.manager.close_poll(&poll_id, true).await.unwrap();
        let rows = h.sheet.rows().await;
        h.manager.resume(rows).await;
        assert!(h.chat.stop_reasons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_arms_timer_for_remaining_window() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_ACCEPT""#);
        h.client.put_row(live_row(2, "p-2", NOW - 30));
        h.refresh().await;
        assert_eq!(h.manager.armed_timers(), 1);
        assert!(h.chat.stop_reasons().is_empty());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(h.chat.stop_reasons().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let reasons = h.chat.stop_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("accepted"));
        assert_eq!(h.cell(2, "vote.result"), "WAIT_ACCEPT");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fast_accept_stop_leaves_poll_open_for_the_timer() {
        let h = Harness::new(SchemaVersion::NewMember, r#"IF(timepassed, "WAIT_ACCEPT", "FASTACCEPT")"#);
        h.client.put_row(proposal(2));
        h.refresh().await;
        let poll_id = h.only_poll_id().await;

        h.chat.fail_stop_poll(true);
        let err = h
            .manager
            .on_poll_update(snapshot(&poll_id, &[("Accept", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Chat(_)));
        assert_eq!(h.cell(2, "done"), "FALSE");
        assert_eq!(h.manager.state(&poll_id).await, Some(ProposalState::PollOpen));

        h.chat.fail_stop_poll(false);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(h.chat.stop_reasons().len(), 1);
        assert_eq!(h.cell(2, "done"), "TRUE");
    }

    #[tokio::test(start_paused = true)]
    async fn edit_on_live_poll_updates_announcement_once() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_DECLINE""#);
        h.client.put_row(live_row(2, "p-2", NOW));
        h.client.put_row(proposal(3).with("validated", "FALSE"));
        h.refresh().await;

        h.client.edit_cell(2, "info", "plays the cello");
        h.client.edit_cell(3, "info", "not live");
        h.refresh().await;
        h.refresh().await;

        let edits = h.chat.edits();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].contains("plays the cello"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_timers() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_ACCEPT""#);
        h.client.put_row(proposal(2));
        h.refresh().await;
        assert_eq!(h.manager.armed_timers(), 1);

        h.manager.shutdown();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.manager.armed_timers(), 0);
        assert!(h.chat.stop_reasons().is_empty());
        assert_eq!(h.cell(2, "done"), "FALSE");
    }

    #[tokio::test(start_paused = true)]
    async fn tally_field_labels_round_trip_through_the_table() {
        let h = Harness::new(SchemaVersion::NewMember, r#""WAIT_DECLINE""#);
        h.client.put_row(proposal(2));
        h.refresh().await;
        let poll_id = h.only_poll_id().await;
        h.manager
            .on_poll_update(snapshot(
                &poll_id,
                &[(CONFIRM, 1), ("Accept", 2), ("Decline", 3), ("Neutral", 4)],
            ))
            .await
            .unwrap();
        let row = h.sheet.find_by_poll_id(&poll_id).await.unwrap();
        for (field, n) in TallyField::ALL.into_iter().zip(1..) {
            assert_eq!(row.tally.get(field), n);
        }
    }
}
