//! Orchestrator Types
//!
//! Run configuration (with a validating builder), per-iteration records, and
//! the run outcome returned to the caller. The state machine itself lives in
//! `engine`.

pub mod engine;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use dsstar_core::error::CoreError;
use dsstar_core::events::{FailureReport, ModelRoles, ProgressEvent, RunSummary};
use dsstar_core::plan::Plan;
use dsstar_gates::harness::SmokeReport;
use dsstar_gates::scanner::ScanReport;

use crate::critics::CriticVerdict;
use crate::error::AppResult;

pub use engine::Orchestrator;

/// Callback receiving progress events. Invoked synchronously, so delivery
/// order equals emission order.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Hard bounds on the per-run iteration budget.
const MAX_ITERS_LIMIT: u32 = 10;
const DEFAULT_MAX_ITERS: u32 = 8;
const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(120);

/// Validated configuration for one synthesis run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub prompt: String,
    pub models: ModelRoles,
    pub max_iters: u32,
    pub library_catalog: String,
    pub call_deadline: Duration,
}

/// Builder for `RunConfig` with validation at build time.
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    prompt: Option<String>,
    models: Option<ModelRoles>,
    max_iters: Option<u32>,
    library_catalog: Option<String>,
    call_deadline: Option<Duration>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user's natural-language request (required).
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the model identifiers for the three roles plus the runtime default
    /// (required).
    pub fn models(mut self, models: ModelRoles) -> Self {
        self.models = Some(models);
        self
    }

    /// Set the iteration budget (1..=10, default 8).
    pub fn max_iters(mut self, n: u32) -> Self {
        self.max_iters = Some(n);
        self
    }

    /// Set the library catalog text embedded in Coder prompts.
    pub fn library_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.library_catalog = Some(catalog.into());
        self
    }

    /// Set the per-model-call deadline (default 120 s).
    pub fn call_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = Some(deadline);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> AppResult<RunConfig> {
        let prompt = self
            .prompt
            .ok_or_else(|| CoreError::validation("prompt is required"))?;
        if prompt.trim().is_empty() {
            return Err(CoreError::validation("prompt cannot be empty").into());
        }
        let models = self
            .models
            .ok_or_else(|| CoreError::validation("models are required"))?;

        let max_iters = self.max_iters.unwrap_or(DEFAULT_MAX_ITERS);
        if max_iters == 0 || max_iters > MAX_ITERS_LIMIT {
            return Err(CoreError::validation(format!(
                "max_iters must be between 1 and {MAX_ITERS_LIMIT}"
            ))
            .into());
        }

        Ok(RunConfig {
            prompt,
            models,
            max_iters,
            library_catalog: self.library_catalog.unwrap_or_default(),
            call_deadline: self.call_deadline.unwrap_or(DEFAULT_CALL_DEADLINE),
        })
    }
}

/// Outcome of one phase within an iteration, for the record.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    pub phase: String,
    pub outcome: String,
}

/// Everything captured during one loop turn. Immutable once sealed.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub iteration_index: u32,
    pub phase_outcomes: Vec<PhaseOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_critique: Option<CriticVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_scan: Option<ScanReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_critique: Option<CriticVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoke_result: Option<SmokeReport>,
    pub start_ts: String,
    pub end_ts: String,
    pub success: bool,
}

impl IterationRecord {
    pub fn new(iteration_index: u32, start_ts: String) -> Self {
        Self {
            iteration_index,
            phase_outcomes: Vec::new(),
            plan: None,
            plan_critique: None,
            html: None,
            security_scan: None,
            code_critique: None,
            smoke_result: None,
            start_ts,
            end_ts: String::new(),
            success: false,
        }
    }

    pub fn record_outcome(&mut self, phase: &str, outcome: impl Into<String>) {
        self.phase_outcomes.push(PhaseOutcome {
            phase: phase.to_string(),
            outcome: outcome.into(),
        });
    }

    /// One attempt-history line for patch prompts, e.g.
    /// `Iteration 2: plan approved, code generated, tests failed`.
    pub fn history_line(&self) -> String {
        let outcomes = self
            .phase_outcomes
            .iter()
            .map(|o| format!("{} {}", o.phase, o.outcome))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Iteration {}: {}", self.iteration_index, outcomes)
    }

    /// Projection persisted as `meta.json`: the record minus the bulky plan
    /// and document bodies, which land in their own files.
    pub fn meta_value(&self) -> Value {
        serde_json::json!({
            "iteration_index": self.iteration_index,
            "phase_outcomes": self.phase_outcomes,
            "security_scan": self.security_scan,
            "start_ts": self.start_ts,
            "end_ts": self.end_ts,
            "success": self.success,
        })
    }
}

/// What `Orchestrator::run` returns to the caller.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub success: bool,
    pub final_plan: Option<Plan>,
    pub final_html_path: Option<PathBuf>,
    pub summary: RunSummary,
    pub history: Vec<IterationRecord>,
    pub failure_reports: Vec<FailureReport>,
    pub security_errors: Vec<String>,
}
