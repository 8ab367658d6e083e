// src/error.rs

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReaperError>;

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{variable} is not set; an API key is required for generation")]
    MissingCredential { variable: String },

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("LAMMPS execution timed out after {} seconds", .timeout.as_secs_f64())]
    EngineTimedOut { timeout: Duration },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ReaperError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
