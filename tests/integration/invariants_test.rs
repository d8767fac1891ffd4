//! Run Invariants
//!
//! Cross-cutting guarantees that must hold for every run: the scanner runs
//! once per generation, failure memory only grows, security failures force a
//! fresh plan, events stay ordered, failed phases advance the iteration
//! instead of aborting the run, and the final artifact is always written.

use std::sync::Arc;

use tempfile::TempDir;

use dsstar_core::events::{PhaseStatus, ProgressEvent, RunPhase};
use dsstar_llm::types::LlmError;

use crate::stubs::*;

const PROMPT: &str = "Create an inventory tracker for my department";

fn html_with_eval() -> String {
    valid_html().replace("const items = [];", "const items = [];\neval(payload);")
}

/// Two consecutive security failures, then a clean pass.
async fn run_two_security_failures() -> (Arc<ScriptedModel>, dsstar::RunOutcome, Vec<ProgressEvent>) {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &html_with_fetch()); // iteration 1: fetch()
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &html_with_eval()); // iteration 2: eval()
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &valid_html()); // iteration 3: clean
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);
    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();
    let events = events.lock().unwrap().clone();
    (model, outcome, events)
}

#[tokio::test]
async fn scanner_runs_exactly_once_per_generation() {
    let (_, outcome, _) = run_two_security_failures().await;
    for record in &outcome.history {
        let generated = record
            .phase_outcomes
            .iter()
            .any(|o| o.phase == "code" && (o.outcome == "generated" || o.outcome == "patched"));
        assert_eq!(
            record.security_scan.is_some(),
            generated,
            "iteration {} scan presence must track code generation",
            record.iteration_index
        );
    }
}

#[tokio::test]
async fn failure_memory_is_monotone_and_ordered() {
    let (model, outcome, _) = run_two_security_failures().await;

    // Both violations accumulated, in the order they were seen.
    assert_eq!(outcome.security_errors, vec!["fetch()", "eval()"]);

    // The second planner prompt carries the first ban; the third carries both.
    let prompts = model.prompts_for(PLANNER);
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains("❌ fetch() IS BANNED"));
    assert!(!prompts[1].contains("❌ eval() IS BANNED"));
    assert!(prompts[2].contains("❌ fetch() IS BANNED"));
    assert!(prompts[2].contains("❌ eval() IS BANNED"));
}

#[tokio::test]
async fn security_failure_forces_fresh_plan() {
    let (model, outcome, _) = run_two_security_failures().await;
    // Every security-failed iteration is followed by a Planner call.
    assert_eq!(model.prompts_for(PLANNER).len(), 3);
    assert_eq!(outcome.summary.plan_approved_at, Some(3));
    assert!(outcome.success);
}

#[tokio::test]
async fn events_are_ordered_within_a_run() {
    let (_, _, events) = run_two_security_failures().await;
    let triples = iteration_events(&events);

    // Iteration numbers never decrease.
    let numbers: Vec<u32> = triples.iter().map(|(i, _, _)| *i).collect();
    let mut sorted = numbers.clone();
    sorted.sort_unstable();
    assert_eq!(numbers, sorted);

    // Within each iteration, security_scan sits strictly between code and tests.
    for iteration in 1..=3u32 {
        let phases: Vec<RunPhase> = triples
            .iter()
            .filter(|(i, _, _)| *i == iteration)
            .map(|(_, phase, _)| *phase)
            .collect();
        let code = phases.iter().position(|p| *p == RunPhase::Code);
        let scan = phases.iter().position(|p| *p == RunPhase::SecurityScan);
        if let (Some(code), Some(scan)) = (code, scan) {
            assert!(scan > code, "scan event must follow code event");
        }
        if let Some(tests) = phases.iter().position(|p| *p == RunPhase::Tests) {
            assert!(scan.unwrap() < tests, "scan event must precede tests event");
        }
    }
}

#[tokio::test]
async fn failed_run_still_writes_final_artifacts() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(smoke_missing_table());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 1)).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.summary.last_failure.is_some());

    // final.html exists, is the transformed document, and is the only copy.
    let final_path = outcome.final_html_path.as_ref().unwrap();
    let final_html = std::fs::read_to_string(final_path).unwrap();
    assert!(final_html.contains("gea-runtime-bridge"));
    let run_dir = final_path.parent().unwrap();
    assert!(run_dir.join("summary.json").is_file());
    let stray_tmp = std::fs::read_dir(run_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().is_some_and(|ext| ext == "tmp"));
    assert!(!stray_tmp);

    // The run completed with a summary even though it failed.
    let events = events.lock().unwrap();
    assert!(matches!(events.last().unwrap(), ProgressEvent::Complete { .. }));
}

#[tokio::test]
async fn planner_parse_failure_advances_the_iteration() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, "I cannot produce a plan right now, sorry.");
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.summary.plan_approved_at, Some(2));
    assert_eq!(outcome.failure_reports[0].phase, "plan");
}

#[tokio::test]
async fn plan_critic_rejection_blocks_codegen_and_feeds_memory() {
    let rejection = r#"{"approved": false,
        "issues": [{"severity": "high", "area": "pages", "message": "no main page declared"}]}"#;
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, rejection); // iteration 1: rejected
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED); // iteration 2: approved
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(model.prompts_for(CODER).len(), 1, "rejected plan must not reach the coder");

    // The critique line is rendered into the next planner prompt.
    let prompts = model.prompts_for(PLANNER);
    assert!(prompts[1].contains("[high] pages: no main page declared"));

    let triples = iteration_events(&events.lock().unwrap());
    assert_subsequence(
        &triples,
        &[
            (1, RunPhase::PlanCritique, PhaseStatus::Rejected),
            (2, RunPhase::Plan, PhaseStatus::Approved),
        ],
    );
}

#[tokio::test]
async fn critic_unavailability_never_blocks_the_pipeline() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue_error(CRITIC, LlmError::Timeout { seconds: 120 }); // plan critic down
    model.enqueue(CODER, &valid_html());
    model.enqueue_error(CRITIC, LlmError::Timeout { seconds: 120 }); // code critic down
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 1);
}

#[tokio::test]
async fn coder_timeout_is_transient_and_retried_next_iteration() {
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue_error(CODER, LlmError::Timeout { seconds: 120 }); // iteration 1
    model.enqueue(CODER, &valid_html()); // iteration 2
    model.enqueue(CRITIC, CRITIC_APPROVED);
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (_, callback) = collecting_callback();
    let orchestrator = orchestrator(Arc::clone(&model), harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 2);
    // The approved plan survived the transient failure.
    assert_eq!(model.prompts_for(PLANNER).len(), 1);
    assert_eq!(outcome.failure_reports[0].phase, "code");
}

#[tokio::test]
async fn code_critic_is_advisory_only() {
    let rejection = r#"{"approved": false,
        "missing": ["chart"],
        "issues": [{"severity": "medium", "message": "chart not rendered"}]}"#;
    let model = Arc::new(ScriptedModel::new());
    model.enqueue(PLANNER, PLAN_REPLY);
    model.enqueue(CRITIC, CRITIC_APPROVED);
    model.enqueue(CODER, &valid_html());
    model.enqueue(CRITIC, rejection); // code critic rejects
    let harness = Arc::new(ScriptedHarness::new());
    harness.enqueue(passing_smoke());

    let temp = TempDir::new().unwrap();
    let (events, callback) = collecting_callback();
    let orchestrator = orchestrator(model, harness, &temp, callback);

    let outcome = orchestrator.run(config(PROMPT, 8)).await.unwrap();

    // Rejection was advisory: the smoke test still ran and the run succeeded.
    assert!(outcome.success);
    assert_eq!(outcome.summary.total_iterations, 1);

    let triples = iteration_events(&events.lock().unwrap());
    assert_subsequence(
        &triples,
        &[
            (1, RunPhase::CodeCritique, PhaseStatus::AdvisoryIssues),
            (1, RunPhase::Tests, PhaseStatus::Passed),
        ],
    );
}
