use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::time::{Instant, sleep};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ballot_core::app::AppBuilder;
use ballot_core::config::Config;
use ballot_core::domain::{PollId, SheetRow, TallyField, is_true};
use ballot_core::impls::{ChatCall, InMemoryChat, InMemorySheet};
use ballot_core::ports::SystemClock;

const DEMO_CHAT: i64 = -1_000_000_000_001;
const DEMO_ROW: u32 = 2;

/// Run one membership vote end to end against the in-memory sheet and chat.
#[derive(Debug, Parser)]
#[command(name = "ballot", version)]
struct Args {
    /// JSON config file; a demo config is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Voting window in seconds (overrides the config).
    #[arg(long)]
    poll_timeout: Option<u64>,

    #[arg(long, default_value_t = 0)]
    confirm: u32,

    #[arg(long, default_value_t = 3)]
    accept: u32,

    #[arg(long, default_value_t = 0)]
    decline: u32,

    #[arg(long, default_value_t = 0)]
    neutral: u32,
}

impl Args {
    fn votes(&self, field: TallyField) -> u32 {
        match field {
            TallyField::Confirm => self.confirm,
            TallyField::Accept => self.accept,
            TallyField::Decline => self.decline,
            TallyField::Neutral => self.neutral,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let mut config = Config::for_chat(DEMO_CHAT);
            config.poll_timeout = 5;
            config.bot.admin = Some("admin".into());
            config
        }
    };
    if let Some(secs) = args.poll_timeout {
        config.poll_timeout = secs;
    }
    config.validate()?;
    let labels = config.label_table()?;
    info!(poll_timeout_secs = config.poll_timeout, "starting demo vote");

    let sheet = Arc::new(InMemorySheet::new(config.sheet.schema));
    sheet.put_row(
        SheetRow::new(DEMO_ROW)
            .with("name", "Alice")
            .with("invitedby", "bob")
            .with("info", "Wants to help with the garden")
            .with("validated", "TRUE")
            .with("votingput", "FALSE"),
    );
    let chat = Arc::new(InMemoryChat::new(Arc::new(SystemClock)));
    chat.set_member_count(10);
    let chat_events = chat.subscribe();

    let app = AppBuilder::new(config.clone())
        .sheet(sheet.clone())
        .chat(chat.clone())
        .build()
        .await?;
    let handle = app.start(chat_events);

    let poll_id = wait_for_poll(&chat, Duration::from_secs(30)).await?;
    let counts: Vec<(&str, u32)> = labels
        .kind()
        .fields()
        .iter()
        .filter_map(|field| labels.label(*field).map(|label| (label, args.votes(*field))))
        .collect();
    chat.vote(&poll_id, &counts).await;

    let deadline = config.poll_timeout() + Duration::from_secs(30);
    tokio::select! {
        closed = wait_until_closed(&sheet, deadline) => closed?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    handle.shutdown_and_join().await;

    for call in chat.calls() {
        if let ChatCall::StopPoll { reason, .. } = call {
            info!(%reason, "poll stopped");
        }
    }
    let row = sheet.row(DEMO_ROW).context("demo row disappeared")?;
    println!("{}", serde_json::to_string_pretty(&row.cells)?);
    Ok(())
}

async fn wait_for_poll(chat: &InMemoryChat, within: Duration) -> anyhow::Result<PollId> {
    let start = Instant::now();
    loop {
        if let Some(ChatCall::OpenPoll { poll_id, .. }) = chat.opened_polls().into_iter().next() {
            return Ok(poll_id);
        }
        if start.elapsed() > within {
            bail!("no poll was opened within {within:?}");
        }
        sleep(Duration::from_millis(200)).await;
    }
}

async fn wait_until_closed(sheet: &InMemorySheet, within: Duration) -> anyhow::Result<()> {
    let start = Instant::now();
    loop {
        let done = sheet
            .row(DEMO_ROW)
            .is_some_and(|row| is_true(row.get("done")));
        if done {
            return Ok(());
        }
        if start.elapsed() > within {
            bail!("poll was not closed within {within:?}");
        }
        sleep(Duration::from_millis(200)).await;
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ballot_core=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_flags() {
        let args = Args::try_parse_from(["ballot", "--poll-timeout", "7", "--accept", "1", "--decline", "4"])
            .unwrap();
        assert_eq!(args.poll_timeout, Some(7));
        assert_eq!(args.votes(TallyField::Accept), 1);
        assert_eq!(args.votes(TallyField::Decline), 4);
        assert_eq!(args.votes(TallyField::Confirm), 0);
        assert!(args.config.is_none());
    }
}
