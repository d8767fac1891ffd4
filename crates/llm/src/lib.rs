//! dsstar Model-Client Seam
//!
//! The orchestrator consumes exactly one model operation: text in, text out,
//! bounded by a per-call deadline. This crate defines that seam:
//!
//! - `types`: the `LlmError` taxonomy and result alias
//! - `provider`: the `ModelClient` trait and the `call_with_deadline` wrapper
//! - `http`: a default OpenAI-compatible chat-completions client
//!
//! Role-to-model mapping is the caller's concern; nothing here assumes a
//! model family.

pub mod http;
pub mod provider;
pub mod types;

pub use http::HttpModelClient;
pub use provider::{call_with_deadline, ModelClient};
pub use types::{LlmError, LlmResult};
