//! Failure-Memory Rendering
//!
//! Pure formatting functions that turn accumulated failure memory and smoke
//! errors into prompt lines. Kept separate from the builders so the exact
//! wording can be snapshot-tested.

use dsstar_core::memory::FailureMemory;
use dsstar_core::patterns::fix_hint;
use dsstar_gates::harness::StructuredError;

/// Render canonical banned-pattern names as actionable ban lines, e.g.
/// `❌ fetch() IS BANNED → Use window.geaRuntimeLLM() for AI calls`.
pub fn security_fix_lines(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("❌ {name} IS BANNED → {}", fix_hint(name)))
        .collect()
}

/// Render the "extra directions" block embedded in Planner prompts: every
/// security violation and plan-critique issue seen so far in this run.
pub fn render_extra_directions(memory: &FailureMemory) -> String {
    let mut out = String::new();

    if !memory.security_errors().is_empty() {
        out.push_str("Previous attempts used banned APIs. Do not repeat them:\n");
        for line in security_fix_lines(memory.security_errors()) {
            out.push_str(&line);
            out.push('\n');
        }
    }

    if !memory.plan_critique_issues().is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Previous plan critiques raised these issues. Address every one:\n");
        for issue in memory.plan_critique_issues() {
            out.push_str("- ");
            out.push_str(issue);
            out.push('\n');
        }
    }

    out
}

/// Render smoke-test structured errors as patch-prompt bullet lines, e.g.
/// `• [CRITICAL] MISSING_ELEMENT: required element 'table' not found (...)`.
pub fn render_smoke_error_lines(errors: &[StructuredError]) -> Vec<String> {
    errors
        .iter()
        .map(|e| {
            format!(
                "• [{}] {}: {} → {}",
                e.severity.to_string().to_uppercase(),
                e.error_type,
                e.message,
                e.suggested_fix
            )
        })
        .collect()
}
