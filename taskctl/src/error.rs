//! Shared error taxonomy raised across broker/runner/registry/
//! planner/orchestrator/router/codegen/episodic boundaries.
//!
//! Each subsystem still owns its own leaf error type (`ToolError`,
//! `LlmError`, ...) for the errors only it can produce; `Error` is the
//! classification every one of those gets mapped into once it crosses a
//! component boundary, so callers can match on *kind* without knowing
//! which subsystem raised it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {reason}")]
    ValidationError { reason: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("queue full: {class} at capacity {capacity}")]
    QueueFull { class: String, capacity: usize },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("blocked by safety gate: {}", .reasons.join("; "))]
    SafetyBlocked { reasons: Vec<String> },

    #[error("code error in {task_name} ({language}): {detail}")]
    CodeError {
        task_name: String,
        language: String,
        detail: String,
    },

    #[error("tool error: {0}")]
    ToolError(#[from] crate::tools::ToolError),

    #[error("transport error: {detail}")]
    TransportError { detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::ValidationError { reason: reason.into() }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound { what, id: id.into() }
    }

    pub fn queue_full(class: impl Into<String>, capacity: usize) -> Self {
        Error::QueueFull { class: class.into(), capacity }
    }

    /// A `SafetyBlocked` outcome carries a `reasons` array, not a
    /// single string - the principles collaborator's `CheckAction` can
    /// return more than one violated category.
    pub fn safety_blocked(reasons: Vec<String>) -> Self {
        Error::SafetyBlocked { reasons }
    }

    pub fn code_error(task_name: impl Into<String>, language: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::CodeError {
            task_name: task_name.into(),
            language: language.into(),
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Error::TransportError { detail: detail.into() }
    }

    /// Whether the retry policy applies: `CodeError` is retried through
    /// the code generator's repair loop, `TransportError` through
    /// exponential backoff. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CodeError { .. } | Error::TransportError { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
