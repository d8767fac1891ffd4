//! dsstar Deterministic Gates
//!
//! The two authoritative quality gates of the synthesis pipeline:
//!
//! - `scanner`: the deterministic regex gate over HTML and extracted script
//!   bodies. LLM critics may opine; the scanner decides.
//! - `harness`: the smoke-test contract (selector derivation from the plan,
//!   console-error classification, and the pass/fail decision) plus the
//!   `SmokeHarness` trait the orchestrator depends on.
//! - `browser` (feature `browser`): the chromiumoxide backend. Without the
//!   feature the harness reports skipped passes so development environments
//!   are never blocked.

pub mod harness;
pub mod scanner;

#[cfg(feature = "browser")]
pub mod browser;

pub use harness::{
    BrowserSmokeHarness, ErrorSeverity, SelectorProbe, SmokeHarness, SmokeReport, StructuredError,
};
pub use scanner::{scan_html, ScanReport, Violation};
