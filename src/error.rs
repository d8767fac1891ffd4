//! Error Handling
//!
//! Application-wide error type for the synthesis pipeline. Extends the core
//! error set with the runtime-stack variants (model transport, harness,
//! invalid plan text).

use thiserror::Error;

use dsstar_core::error::CoreError;
use dsstar_llm::types::LlmError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Core validation/parse errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Model-client errors
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The Planner produced text that no extraction strategy could parse.
    /// Carries the raw reply for the failure report.
    #[error("INVALID_PLAN: planner output is not parseable JSON")]
    InvalidPlan { raw: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run could not complete at all (harness crash, final write failed)
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a fatal error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-plan error carrying the raw model reply
    pub fn invalid_plan(raw: impl Into<String>) -> Self {
        Self::InvalidPlan { raw: raw.into() }
    }
}
