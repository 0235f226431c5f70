//! Errors - エラー型と分類
//!
//! ErrorKind は「この失敗を受けてプロセスがどう振る舞うか」の分類。
//! - Configuration: 起動時 / 初回利用時に致命的。リトライしない
//! - Lookup / Label / Data: ログに出して、そのイベントだけ諦める
//! - External: 外部 API の失敗。コアはリトライしない

use thiserror::Error;

use super::ids::PollId;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Lookup,
    Label,
    Data,
    External,
}

/// SyncError は同期コアのエラー
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing {} in the sheet", describe_columns(.0))]
    MissingColumns(Vec<String>),

    #[error("chat id is not configured")]
    MissingChatId,

    #[error("invalid poll labels: {0}")]
    InvalidLabels(String),

    #[error("no proposal row with poll id {0}")]
    PollNotFound(PollId),

    #[error("no proposal row #{0}")]
    RowNotFound(u32),

    #[error("no tally field for poll option label `{0}`")]
    UnknownLabel(String),

    #[error("row #{row}: {message}")]
    InvalidRow { row: u32, message: String },

    #[error("sheet request failed: {0}")]
    Sheet(String),

    #[error("chat request failed: {0}")]
    Chat(String),
}

fn describe_columns(columns: &[String]) -> String {
    let plural = if columns.len() > 1 { "s" } else { "" };
    format!("`{}` column{plural}", columns.join("`, `"))
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::MissingColumns(_)
            | SyncError::MissingChatId
            | SyncError::InvalidLabels(_) => ErrorKind::Configuration,
            SyncError::PollNotFound(_) | SyncError::RowNotFound(_) => ErrorKind::Lookup,
            SyncError::UnknownLabel(_) => ErrorKind::Label,
            SyncError::InvalidRow { .. } => ErrorKind::Data,
            SyncError::Sheet(_) | SyncError::Chat(_) => ErrorKind::External,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_lists_every_column() {
        let err = SyncError::MissingColumns(vec!["pollid".into(), "done".into()]);
        assert_eq!(err.to_string(), "missing `pollid`, `done` columns in the sheet");

        let err = SyncError::MissingColumns(vec!["done".into()]);
        assert_eq!(err.to_string(), "missing `done` column in the sheet");
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(SyncError::MissingChatId.is_fatal());
        assert!(!SyncError::PollNotFound(PollId::new("1")).is_fatal());
        assert_eq!(SyncError::Chat("timeout".into()).kind(), ErrorKind::External);
        assert_eq!(SyncError::UnknownLabel("Maybe".into()).kind(), ErrorKind::Label);
    }
}
