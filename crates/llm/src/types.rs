//! LLM Error Taxonomy
//!
//! Errors a model call can surface to the orchestrator. The orchestrator
//! treats all of them as the current phase's failure and advances the
//! iteration; the taxonomy exists so logs and failure reports say what
//! actually happened.

use thiserror::Error;

/// Errors from the model-client seam.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The per-call deadline elapsed before the provider answered.
    #[error("Model call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Transport-level failure (connection refused, TLS, DNS).
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The provider answered with a non-success status.
    #[error("Provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The provider answered 2xx but the body was not usable.
    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    /// Anything else.
    #[error("Model call failed: {message}")]
    Other { message: String },
}

/// Result type alias for model calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// Map an HTTP error status to an `LlmError`.
pub fn parse_http_error(status: u16, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::Http {
            status,
            message: "authentication failed".to_string(),
        },
        404 => LlmError::Http {
            status,
            message: format!("model not found: {}", truncate(body, 200)),
        },
        429 => LlmError::Http {
            status,
            message: "rate limited".to_string(),
        },
        _ => LlmError::Http {
            status,
            message: truncate(body, 200).to_string(),
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
