//! dsstar: Iterative Code Synthesis Pipeline
//!
//! Turns a natural-language request for an internal web tool into a single,
//! self-contained HTML document that has been statically vetted and
//! behaviorally smoke-tested. The core is the orchestrator: a multi-phase
//! state machine driving three model roles (Planner, Coder, Critic) through
//! a bounded fixpoint loop of
//! {plan → plan-critique → generate → security-scan → code-critique →
//! smoke-test → patch}, with accumulated failure memory, reactive
//! re-planning on hard security violations, and ordered progress events.
//!
//! The HTTP front door, the runtime key/value store, and deployment
//! promotion are external consumers of this crate's `Orchestrator::run`
//! surface.
//!
//! ```ignore
//! use std::sync::Arc;
//! use dsstar::{ArtifactStore, Orchestrator, RunConfigBuilder};
//! use dsstar_core::events::ModelRoles;
//! use dsstar_gates::harness::BrowserSmokeHarness;
//! use dsstar_llm::http::HttpModelClient;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(HttpModelClient::new("http://localhost:8000/v1/chat/completions", None)),
//!     Arc::new(BrowserSmokeHarness::new()),
//!     ArtifactStore::new("./runs"),
//! );
//! let config = RunConfigBuilder::new()
//!     .prompt("Create an inventory tracker for my department")
//!     .models(ModelRoles {
//!         planner: "planner-model".into(),
//!         coder: "coder-model".into(),
//!         critic: "critic-model".into(),
//!         runtime: "runtime-model".into(),
//!     })
//!     .build()?;
//! let outcome = orchestrator.run(config).await?;
//! ```

pub mod artifacts;
pub mod critics;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod transform;

pub use artifacts::{ArtifactStore, IterationFiles, RunArtifacts};
pub use critics::{CriticIssue, CriticVerdict};
pub use error::{AppError, AppResult};
pub use orchestrator::{
    IterationRecord, Orchestrator, ProgressCallback, RunConfig, RunConfigBuilder, RunOutcome,
};

// Re-export the vocabulary crates so a front door needs only this crate.
pub use dsstar_core as core;
pub use dsstar_gates as gates;
pub use dsstar_llm as llm;
