//! End-to-End Scenarios
//!
//! Full runs through the orchestrator with scripted models and harness,
//! checking the literal outputs each scenario pins down: event sequences,
//! prompt contents, summary fields, and the final artifact.

use std::sync::Arc;

use tempfile::TempDir;

use dsstar_core::events::{PhaseStatus, ProgressEvent, RunPhase};
use dsstar_gates::scanner::scan_html;

use crate::stubs::*;

const PROMPT: &str = "Create an inventory tracker for my department";

// ============================================================================
// First-try success
// ============================================================================

#[tokio::test]
async fn first_try_success_produces_vetted_artifact() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED); // plan critic
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, CRITIC_APPROVED); // code critic
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 1);
    assert_eq!(outcome.summary.plan_approved_at, Some(1));
    assert_eq!(outcome.summary.tests_passed_at, Some(1));
    assert_eq!(outcome.final_plan.as_ref().unwrap().title, "Inventory Tracker");

    // Event protocol: start first, then the phase chronology, then success.
    let events = events.lock().unwrap();
    assert!(matches!(events[0], ProgressEvent::Start { .. }));
    let triples = iteration_events(&events);
    assert_subsequence(
        &triples,
        &[
            (1, RunPhase::Plan, PhaseStatus::Working),
            (1, RunPhase::Plan, PhaseStatus::Approved),
            (1, RunPhase::Code, PhaseStatus::Working),
            (1, RunPhase::SecurityScan, PhaseStatus::Passed),
            (1, RunPhase::CodeCritique, PhaseStatus::Approved),
            (1, RunPhase::Tests, PhaseStatus::Passed),
        ],
    );
    let success_pos = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::Success { iteration: 1, fallback: false, .. }))
        .expect("success event");
    assert!(matches!(events.last().unwrap(), ProgressEvent::Complete { .. }));
    assert!(success_pos < events.len() - 1);

    // Final artifact: one CSP meta, one bridge, and it survives the scanner.
    let final_html =
        std::fs::read_to_string(outcome.final_html_path.as_ref().unwrap()).unwrap();
    assert_eq!(final_html.matches("Content-Security-Policy").count(), 1);
    assert_eq!(final_html.matches("gea-runtime-bridge").count(), 1);
    assert!(scan_html(&final_html).passed);
}

// ============================================================================
// Security hard-fail forces re-plan
// ============================================================================

#[tokio::test]
async fn security_hard_fail_invalidates_plan_and_replans() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED); // plan critic, iteration 1
    model.enqueue(CODER, &html_with_fetch()); // banned construct
    model.enqueue(PLANNER, PLAN_REPLY); // re-plan after invalidation
    model.enqueue(CRITIC, CRITIC_APPROVED); // plan critic, iteration 2
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, CRITIC_APPROVED); // code critic, iteration 2
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.security_errors, vec!["fetch()"]);
    assert_eq!(outcome.summary.plan_approved_at, Some(2));
    assert_eq!(outcome.summary.total_iterations, 2);

    // The scan failure carried the canonical violation name.
    let events = events.lock().unwrap();
    let violation_event = events.iter().find(|e| {
        matches!(
            e,
            ProgressEvent::Iteration {
                phase: RunPhase::SecurityScan,
                status: PhaseStatus::SecurityFailed,
                ..
            }
        )
    });
    match violation_event {
        Some(ProgressEvent::Iteration { iteration, violations, .. }) => {
            assert_eq!(*iteration, 1);
            assert_eq!(violations, &vec!["fetch()".to_string()]);
        }
        other => panic!("expected security_failed event, got {other:?}"),
    }

    // Iteration 2 re-planned, and the planner saw the ban verbatim.
    let planner_prompts = model.prompts_for(PLANNER);
    assert_eq!(planner_prompts.len(), 2);
    assert!(planner_prompts[1]
        .contains("❌ fetch() IS BANNED → Use window.geaRuntimeLLM() for AI calls"));
}

// ============================================================================
// Scanner false-positive suppression
// ============================================================================

#[tokio::test]
async fn banned_names_in_strings_and_comments_pass() {
    let html = valid_html().replace(
        "const items = [];",
        "const items = [];\nconst u = \"fetch(1)\"; // we don't use fetch()",
    );
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &html);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 1);
    assert!(outcome.security_errors.is_empty());
}

// ============================================================================
// Harmless empty-URL stub
// ============================================================================

#[tokio::test]
async fn empty_url_fetch_stub_is_tolerated() {
    let html = valid_html().replace(
        "const items = [];",
        "const items = [];\nconst placeholder = fetch(\"\");",
    );
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &html);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.security_errors.is_empty());
}

// ============================================================================
// Patch cycle
// ============================================================================

#[tokio::test]
async fn smoke_failure_triggers_patch_not_fresh_generation() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED); // plan critic
    model.enqueue(CODER, &valid_html()); // iteration 1: fresh
    model.enqueue(CRITIC, CRITIC_APPROVED); // code critic, iteration 1
    model.enqueue(CODER, &valid_html()); // iteration 2: patch
    model.enqueue(CRITIC, CRITIC_APPROVED); // code critic, iteration 2
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(smoke_missing_table());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 2);
    assert_eq!(outcome.summary.tests_passed_at, Some(2));

    // The plan survived; only the code was patched.
    assert_eq!(model.prompts_for(PLANNER).len(), 1);

    let coder_prompts = model.prompts_for(CODER);
    assert_eq!(coder_prompts.len(), 2);
    assert!(coder_prompts[1].contains("CURRENT DOCUMENT:"));
    assert!(coder_prompts[1].contains("• [CRITICAL] MISSING_ELEMENT:"));
    assert!(coder_prompts[1].contains("'table'"));
}

// ============================================================================
// Fallback success
// ============================================================================

#[tokio::test]
async fn fallback_success_after_three_quarters_of_budget() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED); // plan critic
    for _ in 0..3 {
        model.enqueue(CODER, &valid_html());
        model.enqueue(CRITIC, CRITIC_APPROVED); // code critic per iteration
    }
    let harness = Arc::new(ScriptedHarness::new());
    for _ in 0..3 {
        harness.enqueue(smoke_medium_issues());
    }

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 4)).await.unwrap();

    assert!(outcome.success);
    assert!(outcome.summary.fallback);
    assert_eq!(outcome.summary.total_iterations, 3);
    assert_eq!(outcome.summary.tests_passed_at, None);

    let events = events.lock().unwrap();
    let success = events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::Success { iteration, fallback, .. } => Some((*iteration, *fallback)),
            _ => None,
        })
        .expect("success event");
    assert_eq!(success, (3, true));
}
