use shared::error::ValidationError;
use thiserror::Error;

use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },
    #[error("a download is already in progress")]
    DownloadInProgress,
    #[error("download failed: {0}")]
    Download(String),
    #[error("workflow was reset before the operation completed")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
