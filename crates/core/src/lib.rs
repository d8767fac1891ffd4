//! dsstar Core Types
//!
//! Foundation crate for the dsstar synthesis pipeline. Holds the types shared
//! between the orchestrator, the gates, and the model-client seam:
//!
//! - `error`: `CoreError` / `CoreResult`
//! - `plan`: the open-record app plan with a validated required subset
//! - `events`: the progress-event protocol emitted to run subscribers
//! - `memory`: per-run append-only failure memory
//! - `patterns`: the canonical banned-pattern vocabulary and fix hints
//!
//! These types are dependency-light (serde + thiserror + std) so every other
//! crate in the workspace can use them without pulling in the runtime stack.

pub mod error;
pub mod events;
pub mod memory;
pub mod patterns;
pub mod plan;

pub use error::{CoreError, CoreResult};
pub use events::{ModelRoles, PhaseStatus, ProgressEvent, RunPhase};
pub use memory::FailureMemory;
pub use patterns::{fix_hint, BannedPattern, BANNED_PATTERNS};
pub use plan::Plan;
