//! Error types shared by every pipeline stage.

use std::time::Duration;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while running a transcode or transcription job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Client-facing problem: bad extension, unknown language, job in wrong state.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("speech service error: {0}")]
    Speech(String),

    #[error("object store error: {0}")]
    Storage(String),

    #[error("job registry error: {0}")]
    Registry(String),

    #[error("{operation} timed out after {:?}", .after)]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn tool(tool: &'static str, msg: impl Into<String>) -> Self {
        Self::Tool {
            tool,
            message: msg.into(),
        }
    }

    pub fn speech(msg: impl Into<String>) -> Self {
        Self::Speech(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error was caused by the caller's input rather than a
    /// failing collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
