//! Crate-wide error type.
//!
//! Every layer returns `crate::error::Result<T>`. The first group of variants
//! is the pipeline taxonomy callers match on; the second group covers transport,
//! I/O and configuration failures before they are classified by a stage.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Which polling loop ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStage {
    TransferTarget,
    Commit,
}

impl fmt::Display for PollStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStage::TransferTarget => f.write_str("transferTarget"),
            PollStage::Commit => f.write_str("commit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("app record rejected: status={status}, body={body}")]
    Create { status: u16, body: String },

    #[error("block transfer failed: block={block_index:?}, status={status:?}, {message}")]
    Transfer {
        block_index: Option<u32>,
        status: Option<u16>,
        message: String,
    },

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("timed out waiting for {0}")]
    Timeout(PollStage),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("api error: {0}")]
    Api(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AppError::Create { status, .. } | AppError::Status { status, .. } => Some(*status),
            AppError::Transfer { status, .. } => *status,
            _ => None,
        }
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Record,
    Encrypt,
    ContentVersion,
    ContentFile,
    Commit,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Record => "record",
            Stage::Encrypt => "encrypt",
            Stage::ContentVersion => "contentVersion",
            Stage::ContentFile => "contentFile",
            Stage::Commit => "commit",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A pipeline error tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("upload failed at {stage}: {source}")]
pub struct UploadFailure {
    pub stage: Stage,
    #[source]
    pub source: AppError,
}

impl UploadFailure {
    pub fn new(stage: Stage, source: AppError) -> Self {
        Self { stage, source }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AppError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => AppError::Network(err.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(format!("malformed JSON: {}", err))
    }
}
