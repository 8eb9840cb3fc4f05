use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a user-facing notification stays on screen.
pub const NOTIFICATION_DURATION: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    FortuneGenerationFailed,
    CardRenderingFailed,
    AssetHostingFailed,
    DownloadFailed,
}

impl ErrorKind {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "Please enter a GitHub username.",
            Self::FortuneGenerationFailed => "Failed to generate fortune. Please try again.",
            Self::CardRenderingFailed => "Failed to render your fortune card. Please try again.",
            Self::AssetHostingFailed => "Failed to upload your fortune card. Please try again.",
            Self::DownloadFailed => "Failed to download your fortune card. Please try again.",
        }
    }

    /// Pipeline failures move the session to `Failed`; the others leave the phase alone.
    pub fn is_pipeline_failure(self) -> bool {
        matches!(
            self,
            Self::FortuneGenerationFailed | Self::CardRenderingFailed | Self::AssetHostingFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: ErrorKind,
    pub message: String,
    pub duration: Duration,
}

impl Notification {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            duration: NOTIFICATION_DURATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("handle must not be empty")]
    EmptyHandle,
    #[error("fortune text must not be empty")]
    EmptyFortune,
    #[error("invalid hosted image url: {0}")]
    InvalidImageUrl(String),
}

/// Failure of a single request/response exchange with a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}
