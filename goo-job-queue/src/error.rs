//! Error types for queues and jobs.

use std::time::Duration;

use thiserror::Error;

use crate::types::Receipt;

/// Errors that may occur while interacting with a queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend is unavailable")]
    Unavailable,

    #[error("queue backend error: {0}")]
    Backend(String),

    #[error("no in-flight message for receipt {0}")]
    ReceiptNotFound(Receipt),

    #[error("message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl QueueError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Errors returned by job handlers, or produced by the runner on their behalf.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no {0} in message")]
    MissingField(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("job execution failed: {0}")]
    Execution(String),

    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}
