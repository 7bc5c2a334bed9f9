use std::path::PathBuf;

use thiserror::Error;

/// Failures of one extraction attempt (request + validation).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("inference endpoint transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("no listing objects found in model response")]
    NoRecordsFound,
}

/// What the retry controller does with a failed attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

impl ExtractError {
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            Self::Transport {
                transient: false, ..
            } => RetryDecision::Abort,
            Self::Transport { .. } | Self::MalformedResponse(_) | Self::NoRecordsFound => {
                RetryDecision::Retry
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NoRecordsFound => "no_records_found",
        }
    }
}

/// A single candidate object that does not fit the job record shape.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("candidate {index} rejected: {reason}")]
pub struct SchemaViolation {
    pub index: usize,
    pub post_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ScoreTableError {
    #[error("score table is missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("failed to read score file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("unsupported score file format {path}; export the spreadsheet to CSV")]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Debug, Error)]
#[error("failed to read document {path}: {message}")]
pub struct FileReadError {
    pub path: PathBuf,
    pub message: String,
}
