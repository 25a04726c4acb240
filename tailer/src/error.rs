//! Tailer-specific error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::StreamKind;

#[derive(Error, Debug)]
pub enum TailerError {
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("error creating {stream} pipe")]
    PipeUnavailable { stream: StreamKind },

    #[error("error starting command '{program}' in {}: {source}", working_dir.display())]
    SpawnFailed {
        program: String,
        working_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error creating listening socket on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("Write to subscriber timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TailerError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error happened before anything was served
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::PipeUnavailable { .. }
                | Self::SpawnFailed { .. }
                | Self::BindFailed { .. }
        )
    }
}

pub type TailerResult<T> = Result<T, TailerError>;
