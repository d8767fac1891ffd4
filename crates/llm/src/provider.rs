//! Model Client Trait
//!
//! The single operation the orchestrator consumes. Implementations live
//! behind this trait so the test suite can substitute deterministic stubs
//! and the front door can wire in whatever provider adapter it resolves.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{LlmError, LlmResult};

/// Text-in/text-out model call. `model` is an opaque identifier resolved by
/// the caller; implementations must not assume a model family.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, model: &str, prompt: &str) -> LlmResult<String>;
}

/// Run a model call under a deadline. Deadline expiry is reported as
/// `LlmError::Timeout` so the orchestrator can record it as a transient
/// phase failure.
pub async fn call_with_deadline(
    client: &dyn ModelClient,
    model: &str,
    prompt: &str,
    deadline: Duration,
) -> LlmResult<String> {
    match tokio::time::timeout(deadline, client.call(model, prompt)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            seconds: deadline.as_secs(),
        }),
    }
}
