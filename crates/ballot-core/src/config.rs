//! Configuration
//!
//! Loaded once at startup from a camelCase JSON file. Every numeric option
//! has a default; `bot.chat` is optional in the file and only checked when
//! the app is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChatId, LabelTable, SchemaVersion, SyncError, TallyField};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

fn default_poll_timeout() -> u64 {
    60
}

fn default_update_interval() -> u64 {
    2000
}

fn default_rate_limit_interval() -> u64 {
    1000
}

fn default_credentials() -> String {
    "credentials.json".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Voting window, seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
    /// Sheet refresh period, milliseconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    /// Minimum spacing between sheet requests, milliseconds.
    #[serde(default = "default_rate_limit_interval")]
    pub rate_limit_interval: u64,
    pub sheet: SheetConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Path of the service-account credentials file.
    #[serde(default = "default_credentials")]
    pub credentials: String,
    /// Decision formula; the built-in rule is used when absent.
    #[serde(default)]
    pub formula: Option<String>,
    /// Link to the sheet, used to build per-row links.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub schema: SchemaVersion,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    /// Path of the local user-lookup cache.
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub chat: Option<i64>,
    /// Handle mentioned in close announcements.
    #[serde(default)]
    pub admin: Option<String>,
    /// Where the reporter forwards notices and errors.
    #[serde(default)]
    pub report_chat: Option<i64>,
    /// Custom poll option labels, keyed by tally field.
    #[serde(default)]
    pub labels: Option<BTreeMap<TallyField, String>>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Minimal config for a given chat, everything else defaulted.
    pub fn for_chat(chat: i64) -> Self {
        Self {
            poll_timeout: default_poll_timeout(),
            update_interval: default_update_interval(),
            rate_limit_interval: default_rate_limit_interval(),
            sheet: SheetConfig {
                id: String::new(),
                title: String::new(),
                credentials: default_credentials(),
                formula: None,
                link: None,
                schema: SchemaVersion::default(),
            },
            bot: BotConfig {
                chat: Some(chat),
                ..BotConfig::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout == 0 {
            return Err(ConfigError::InvalidValue("pollTimeout must be positive".into()));
        }
        if self.update_interval == 0 {
            return Err(ConfigError::InvalidValue("updateInterval must be positive".into()));
        }
        Ok(())
    }

    pub fn chat_id(&self) -> Result<ChatId, SyncError> {
        self.bot.chat.map(ChatId::new).ok_or(SyncError::MissingChatId)
    }

    pub fn report_chat(&self) -> Option<ChatId> {
        self.bot.report_chat.map(ChatId::new)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval)
    }

    /// Poll option labels for the configured schema.
    pub fn label_table(&self) -> Result<LabelTable, SyncError> {
        let kind = self.sheet.schema.poll_kind();
        match &self.bot.labels {
            Some(labels) => LabelTable::custom(kind, labels.clone()),
            None => Ok(LabelTable::for_kind(kind)),
        }
    }
}
