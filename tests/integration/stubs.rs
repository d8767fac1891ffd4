//! Deterministic Test Stubs
//!
//! A scripted model client keyed by model id, a scripted smoke harness, and
//! an event-collecting progress callback. Model replies are consumed in
//! FIFO order per model id, so a test reads as the chronology of the run it
//! drives.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use dsstar::orchestrator::{Orchestrator, ProgressCallback, RunConfig, RunConfigBuilder};
use dsstar::ArtifactStore;
use dsstar_core::events::{ModelRoles, PhaseStatus, ProgressEvent, RunPhase};
use dsstar_core::plan::Plan;
use dsstar_gates::harness::{
    missing_element_error, ErrorSeverity, SelectorProbe, SmokeHarness, SmokeReport,
    StructuredError,
};
use dsstar_llm::provider::ModelClient;
use dsstar_llm::types::{LlmError, LlmResult};

pub const PLANNER: &str = "planner-m";
pub const CODER: &str = "coder-m";
pub const CRITIC: &str = "critic-m";
pub const RUNTIME: &str = "runtime-m";

pub fn roles() -> ModelRoles {
    ModelRoles {
        planner: PLANNER.to_string(),
        coder: CODER.to_string(),
        critic: CRITIC.to_string(),
        runtime: RUNTIME.to_string(),
    }
}

// ============================================================================
// Scripted model client
// ============================================================================

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<HashMap<String, VecDeque<LlmResult<String>>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, model: &str, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Ok(reply.to_string()));
    }

    pub fn enqueue_error(&self, model: &str, error: LlmError) {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Prompts sent to a given model, in call order.
    pub fn prompts_for(&self, model: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn call(&self, model: &str, prompt: &str) -> LlmResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(LlmError::Other {
                    message: format!("script exhausted for model {model}"),
                })
            })
    }
}

// ============================================================================
// Scripted smoke harness
// ============================================================================

#[derive(Default)]
pub struct ScriptedHarness {
    reports: Mutex<VecDeque<SmokeReport>>,
}

impl ScriptedHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, report: SmokeReport) {
        self.reports.lock().unwrap().push_back(report);
    }
}

#[async_trait]
impl SmokeHarness for ScriptedHarness {
    async fn run(&self, _html: &str, _plan: &Plan) -> SmokeReport {
        self.reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(passing_smoke)
    }
}

pub fn passing_smoke() -> SmokeReport {
    SmokeReport {
        passed: true,
        skipped: false,
        results: Vec::new(),
        logs: Vec::new(),
        structured_errors: Vec::new(),
    }
}

/// A failed smoke report: the critical `table` selector is missing.
pub fn smoke_missing_table() -> SmokeReport {
    let probe = SelectorProbe {
        label: "table".to_string(),
        selector: "table, .table, [role='table']".to_string(),
        critical: true,
    };
    SmokeReport {
        passed: false,
        skipped: false,
        results: Vec::new(),
        logs: vec!["table not rendered".to_string()],
        structured_errors: vec![missing_element_error(&probe)],
    }
}

/// A failed smoke report carrying only medium-severity noise.
pub fn smoke_medium_issues() -> SmokeReport {
    SmokeReport {
        passed: false,
        skipped: false,
        results: Vec::new(),
        logs: vec!["Deprecated API used in script".to_string()],
        structured_errors: vec![StructuredError {
            error_type: "CONSOLE_ERROR".to_string(),
            message: "Deprecated API used in script".to_string(),
            severity: ErrorSeverity::Medium,
            suggested_fix: "Review the console error and fix the offending script".to_string(),
        }],
    }
}

// ============================================================================
// Canned replies
// ============================================================================

pub const PLAN_REPLY: &str = r#"{
  "title": "Inventory Tracker",
  "pages": [{"name": "Main", "purpose": "track inventory"}],
  "ui_components": ["table", "form", "button"],
  "description": "Tracks department inventory"
}"#;

pub const CRITIC_APPROVED: &str = r#"{"approved": true, "issues": []}"#;

pub fn valid_html() -> String {
    r##"<!DOCTYPE html>
<html>
<head><title>Inventory Tracker</title></head>
<body>
<h1>Inventory Tracker</h1>
<table id="items"></table>
<form id="add"><input type="text" name="name"><button type="submit">Add</button></form>
<script>
const items = [];
function render() {
  const table = document.querySelector("#items");
  table.innerHTML = items.map(i => "<tr><td>" + i + "</td></tr>").join("");
}
document.querySelector("#add").addEventListener("submit", (e) => {
  e.preventDefault();
  items.push(e.target.name.value);
  render();
});
</script>
</body>
</html>"##
        .to_string()
}

pub fn html_with_fetch() -> String {
    valid_html().replace(
        "const items = [];",
        "const items = [];\nfetch(\"/data\").then(r => r.json());",
    )
}

// ============================================================================
// Run helpers
// ============================================================================

pub fn collecting_callback() -> (Arc<Mutex<Vec<ProgressEvent>>>, ProgressCallback) {
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event| sink.lock().unwrap().push(event));
    (events, callback)
}

pub fn orchestrator(
    model: Arc<ScriptedModel>,
    harness: Arc<ScriptedHarness>,
    temp: &TempDir,
    callback: ProgressCallback,
) -> Orchestrator {
    Orchestrator::new(model, harness, ArtifactStore::new(temp.path())).with_progress(callback)
}

pub fn config(prompt: &str, max_iters: u32) -> RunConfig {
    RunConfigBuilder::new()
        .prompt(prompt)
        .models(roles())
        .max_iters(max_iters)
        .build()
        .unwrap()
}

/// The `(iteration, phase, status)` triples of every iteration event.
pub fn iteration_events(events: &[ProgressEvent]) -> Vec<(u32, RunPhase, PhaseStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Iteration {
                iteration,
                phase,
                status,
                ..
            } => Some((*iteration, *phase, *status)),
            _ => None,
        })
        .collect()
}

/// Assert `expected` appears within `actual` in order (not necessarily
/// contiguously).
pub fn assert_subsequence(
    actual: &[(u32, RunPhase, PhaseStatus)],
    expected: &[(u32, RunPhase, PhaseStatus)],
) {
    let mut cursor = 0;
    for step in expected {
        let found = actual[cursor..].iter().position(|triple| triple == step);
        match found {
            Some(offset) => cursor += offset + 1,
            None => panic!("expected event {step:?} not found in order; actual: {actual:?}"),
        }
    }
}
