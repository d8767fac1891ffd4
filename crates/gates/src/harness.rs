//! Smoke-Test Harness
//!
//! Behavioral prober for generated documents. The pure parts live here and
//! are fully testable without a browser: deriving DOM selector probes from
//! the plan, classifying captured console errors, filtering harmless noise,
//! and the pass/fail decision. The browser round-trip itself sits behind the
//! `SmokeHarness` trait so the orchestrator can be driven with deterministic
//! stubs, and behind the `browser` cargo feature so the heavy backend is
//! opt-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dsstar_core::plan::Plan;

/// Element id of the injected runtime bridge; the harness checks the global
/// surface this script defines.
pub const BRIDGE_GLOBAL_CHECK: &str =
    "typeof window.geaRuntimeLLM === 'function' && \
     typeof window.geaRuntimeStore === 'object' && \
     typeof window.geaRuntimeStore.get === 'function' && \
     typeof window.geaRuntimeStore.set === 'function'";

/// How many missing selectors (of any criticality) a passing run may have.
const MISSING_SELECTOR_BUDGET: usize = 3;

/// Severity of a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Critical,
    Medium,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "critical"),
            ErrorSeverity::Medium => write!(f, "medium"),
        }
    }
}

/// One structured error captured during the smoke test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredError {
    /// Machine-readable kind: `CONSOLE_ERROR`, `UNCAUGHT_EXCEPTION`,
    /// `MISSING_ELEMENT`, `BRIDGE_MISSING`, `LOAD_FAILED`.
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub suggested_fix: String,
}

/// A DOM probe derived from the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorProbe {
    /// The plan entry this probe came from ("table", "form", "title", ...).
    pub label: String,
    /// Union CSS selector to query.
    pub selector: String,
    /// Whether a miss fails the run.
    pub critical: bool,
}

/// Outcome of querying one probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorCheck {
    pub probe: SelectorProbe,
    pub found: bool,
}

/// Harness output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeReport {
    pub passed: bool,
    /// Set when browser automation was unavailable and the test did not run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub results: Vec<SelectorCheck>,
    /// Raw console-error lines, in capture order.
    pub logs: Vec<String>,
    pub structured_errors: Vec<StructuredError>,
}

impl SmokeReport {
    /// A skipped pass, used when no browser backend is available.
    pub fn skipped(reason: &str) -> Self {
        Self {
            passed: true,
            skipped: true,
            results: Vec::new(),
            logs: vec![reason.to_string()],
            structured_errors: Vec::new(),
        }
    }

    /// Errors with critical severity.
    pub fn critical_errors(&self) -> Vec<&StructuredError> {
        self.structured_errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Critical)
            .collect()
    }
}

/// The capability the orchestrator depends on.
#[async_trait]
pub trait SmokeHarness: Send + Sync {
    async fn run(&self, html: &str, plan: &Plan) -> SmokeReport;
}

// ============================================================================
// Console-error classification
// ============================================================================

/// Noise the browser emits that says nothing about the generated app.
pub fn is_harmless_console_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    (lower.contains("favicon") && lower.contains("404"))
        || lower.contains("favicon.ico")
        || lower.contains("socket.io")
        || lower.contains("resizeobserver loop")
        || lower.contains("non-error promise rejection")
}

/// Classify a console error and derive a suggested fix.
pub fn classify_console_error(message: &str) -> (ErrorSeverity, String) {
    let lower = message.to_lowercase();

    let critical = lower.contains("undefined is not a function")
        || lower.contains("is not defined")
        || lower.contains("cannot read propert")
        || lower.contains("null")
        || lower.contains("syntaxerror")
        || lower.contains("typeerror")
        || lower.contains("referenceerror");
    let severity = if critical {
        ErrorSeverity::Critical
    } else {
        ErrorSeverity::Medium
    };

    let fix = if lower.contains("is not defined") {
        let name = message
            .split_whitespace()
            .next()
            .unwrap_or("the identifier")
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        format!("Define '{name}' before it is used, or remove the reference")
    } else if lower.contains("cannot read propert") || lower.contains("null") {
        "Guard the DOM lookup: check the element exists before accessing its properties"
            .to_string()
    } else if lower.contains("failed to fetch")
        || lower.contains("network")
        || lower.contains("cors")
    {
        "Use window.geaRuntimeLLM()/window.geaRuntimeStore instead of direct network access"
            .to_string()
    } else if lower.contains("syntaxerror") {
        "Fix the JavaScript syntax error; the script did not parse".to_string()
    } else {
        "Review the console error and fix the offending script".to_string()
    };

    (severity, fix)
}

/// Build a structured error from one console-error line.
pub fn structured_console_error(message: &str, error_type: &str) -> StructuredError {
    let (severity, suggested_fix) = classify_console_error(message);
    StructuredError {
        error_type: error_type.to_string(),
        message: message.to_string(),
        severity,
        suggested_fix,
    }
}

// ============================================================================
// Selector derivation
// ============================================================================

/// Keyword table mapping plan component tags to DOM probes.
const COMPONENT_PROBES: &[(&[&str], &str, bool)] = &[
    (
        &["button", "submit"],
        "button, input[type='submit'], input[type='button']",
        true,
    ),
    (&["table", "grid"], "table, .table, [role='table']", true),
    (&["form", "input"], "form, input, textarea", true),
    (&["chart", "graph", "visual"], "canvas, svg, .chart", true),
    (
        &["modal", "dialog", "popup"],
        ".modal, dialog, [role='dialog']",
        false,
    ),
    (
        &["search"],
        "input[type='search'], .search, input[placeholder]",
        true,
    ),
    (&["dropdown", "select"], "select, .dropdown", true),
    (&["tab"], ".tab, .tabs, [role='tab']", false),
    (&["card"], ".card", false),
    (&["list"], "ul, ol, .list", false),
];

/// Derive the DOM probes for a plan: component keywords, a header probe for
/// the title, a nav probe when there is more than one page, and a container
/// probe when data bindings exist. Duplicate selectors are removed.
pub fn derive_selector_probes(plan: &Plan) -> Vec<SelectorProbe> {
    let mut probes: Vec<SelectorProbe> = Vec::new();

    for component in &plan.ui_components {
        let lower = component.to_lowercase();
        for (keywords, selector, critical) in COMPONENT_PROBES {
            if keywords.iter().any(|k| lower.contains(k)) {
                probes.push(SelectorProbe {
                    label: component.clone(),
                    selector: selector.to_string(),
                    critical: *critical,
                });
                break;
            }
        }
    }

    if !plan.title.trim().is_empty() {
        probes.push(SelectorProbe {
            label: "title".to_string(),
            selector: "h1, h2, header, .header, .title".to_string(),
            critical: true,
        });
    }

    if plan.pages.len() > 1 {
        probes.push(SelectorProbe {
            label: "navigation".to_string(),
            selector: "nav, .nav, .navbar, [role='navigation']".to_string(),
            critical: true,
        });
    }

    if plan.data_bindings().is_some() {
        probes.push(SelectorProbe {
            label: "data container".to_string(),
            selector: "main, #app, .container, [data-bind]".to_string(),
            critical: false,
        });
    }

    let mut seen = std::collections::HashSet::new();
    probes.retain(|p| seen.insert(p.selector.clone()));
    probes
}

/// Structured error for a missing critical element.
pub fn missing_element_error(probe: &SelectorProbe) -> StructuredError {
    StructuredError {
        error_type: "MISSING_ELEMENT".to_string(),
        message: format!(
            "required element '{}' not found (selector: {})",
            probe.label, probe.selector
        ),
        severity: ErrorSeverity::Critical,
        suggested_fix: format!(
            "Add a {} element the plan calls for; it should match `{}`",
            probe.label, probe.selector
        ),
    }
}

// ============================================================================
// Pass/fail decision
// ============================================================================

/// The harness verdict: load succeeded, no critical console errors, no
/// missing critical selectors, and no more than three missing selectors in
/// total.
pub fn decide_pass(
    load_ok: bool,
    critical_error_count: usize,
    missing_critical: usize,
    missing_total: usize,
) -> bool {
    load_ok
        && critical_error_count == 0
        && missing_critical == 0
        && missing_total <= MISSING_SELECTOR_BUDGET
}

// ============================================================================
// Default harness
// ============================================================================

/// The production harness. With the `browser` feature it drives a headless
/// browser; without it every run reports a skipped pass so the pipeline is
/// never blocked in environments with no browser installed.
#[derive(Debug, Default)]
pub struct BrowserSmokeHarness;

impl BrowserSmokeHarness {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmokeHarness for BrowserSmokeHarness {
    #[cfg(feature = "browser")]
    async fn run(&self, html: &str, plan: &Plan) -> SmokeReport {
        match crate::browser::run_smoke_test(html, plan).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(error = %err, "browser unavailable; smoke test skipped");
                SmokeReport::skipped(&format!("browser unavailable: {err}"))
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn run(&self, _html: &str, _plan: &Plan) -> SmokeReport {
        tracing::warn!("built without the `browser` feature; smoke test skipped");
        SmokeReport::skipped("browser automation unavailable; smoke test skipped")
    }
}
