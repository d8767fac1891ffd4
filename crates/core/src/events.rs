//! Progress Event Protocol
//!
//! Synthesis runs publish ordered progress events to an external subscriber
//! (typically an SSE bridge). The enum is internally tagged so the wire shape
//! is a flat JSON object with a `type` discriminator, matching what the
//! dashboard consumes. Every event carries the resolved model roles so a
//! consumer can render attribution without tracking run state.

use serde::{Deserialize, Serialize};

/// Model identifiers for the three agent roles plus the runtime default
/// baked into generated apps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRoles {
    pub planner: String,
    pub coder: String,
    pub critic: String,
    pub runtime: String,
}

/// Phase of the per-iteration state machine, as published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    Plan,
    PlanCritique,
    Code,
    CodeCritique,
    SecurityScan,
    Tests,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunPhase::Start => "start",
            RunPhase::Plan => "plan",
            RunPhase::PlanCritique => "plan_critique",
            RunPhase::Code => "code",
            RunPhase::CodeCritique => "code_critique",
            RunPhase::SecurityScan => "security_scan",
            RunPhase::Tests => "tests",
        };
        write!(f, "{s}")
    }
}

/// Outcome status attached to an iteration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Working,
    Approved,
    Rejected,
    AdvisoryIssues,
    SecurityFailed,
    Failed,
    Passed,
}

/// Severity attached to a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSeverity {
    High,
    Medium,
    Low,
}

/// One failure recorded during a run, in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// 1-based iteration the failure occurred in.
    pub iteration: u32,
    /// Phase name ("plan", "plan_critique", "code", "security", "code_critique", "tests").
    pub phase: String,
    pub severity: ReportSeverity,
    pub message: String,
}

impl FailureReport {
    pub fn new(
        iteration: u32,
        phase: impl Into<String>,
        severity: ReportSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            iteration,
            phase: phase.into(),
            severity,
            message: message.into(),
        }
    }
}

/// Final run summary, persisted as `summary.json` and carried by the
/// `complete` event. Field names are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub success: bool,
    /// Whether success was declared via the fallback condition.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    pub total_iterations: u32,
    pub plan_approved_at: Option<u32>,
    pub code_approved_at: Option<u32>,
    pub tests_passed_at: Option<u32>,
    pub last_failure: Option<String>,
    pub accumulated_security_errors: Vec<String>,
    pub failure_reports: Vec<FailureReport>,
    /// RFC 3339 completion timestamp.
    pub timestamp: String,
}

/// One progress event. Delivery order equals emission order within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A run has started.
    Start {
        run_id: String,
        max_iters: u32,
        models: ModelRoles,
    },

    /// A phase transition inside an iteration.
    Iteration {
        iteration: u32,
        max_iters: u32,
        phase: RunPhase,
        status: PhaseStatus,
        models: ModelRoles,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        issues: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        missing: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        violations: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fatal_error: Option<String>,
    },

    /// The run succeeded at the given iteration.
    Success {
        iteration: u32,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        fallback: bool,
        models: ModelRoles,
    },

    /// The run is over; the summary is final.
    Complete {
        summary: RunSummary,
        models: ModelRoles,
    },

    /// The run aborted with a fatal error.
    Error { error: String, models: ModelRoles },
}

impl ProgressEvent {
    /// Shorthand for a bare iteration transition with no detail lists.
    pub fn iteration(
        iteration: u32,
        max_iters: u32,
        phase: RunPhase,
        status: PhaseStatus,
        models: ModelRoles,
    ) -> Self {
        ProgressEvent::Iteration {
            iteration,
            max_iters,
            phase,
            status,
            models,
            issues: Vec::new(),
            missing: Vec::new(),
            errors: Vec::new(),
            violations: Vec::new(),
            fatal_error: None,
        }
    }
}
