//! Orchestrator State Machine
//!
//! Drives one synthesis run through a bounded fixpoint loop of
//! {plan → plan-critique → generate → security-scan → code-critique →
//! smoke-test → patch}. Phases inside a run are strictly sequential; the
//! only suspension points are model calls, the harness round-trip, and
//! artifact writes. Concurrent runs share nothing but the artifact store,
//! which serializes on distinct run directories.
//!
//! Gate semantics: the Plan-Critic and the security scanner block; the
//! Code-Critic is advisory and only feeds failure memory; the smoke harness
//! decides success. A security hard-fail invalidates the plan so the next
//! iteration re-plans with explicit ban lines. The iteration budget is the
//! only other termination guard.

use std::sync::Arc;

use chrono::Utc;

use dsstar_core::events::{
    FailureReport, PhaseStatus, ProgressEvent, ReportSeverity, RunPhase, RunSummary,
};
use dsstar_core::memory::FailureMemory;
use dsstar_core::plan::Plan;
use dsstar_gates::harness::{SmokeHarness, SmokeReport};
use dsstar_gates::scanner::scan_html;
use dsstar_llm::provider::{call_with_deadline, ModelClient};

use crate::artifacts::{ArtifactStore, IterationFiles};
use crate::critics::{run_critic, CriticVerdict};
use crate::error::AppResult;
use crate::normalize::{extract_html, extract_json};
use crate::prompts::{
    build_code_critic_prompt, build_coder_prompt, build_patch_prompt, build_plan_critic_prompt,
    build_planner_prompt, render_extra_directions, render_smoke_error_lines, security_fix_lines,
};
use crate::transform;

use super::{IterationRecord, ProgressCallback, RunConfig, RunOutcome};

/// How many recent code-critique issues a patch prompt carries.
const PATCH_CODE_ISSUE_WINDOW: usize = 5;

/// The multi-phase synthesis driver.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    harness: Arc<dyn SmokeHarness>,
    store: ArtifactStore,
    on_progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        harness: Arc<dyn SmokeHarness>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            model,
            harness,
            store,
            on_progress: None,
        }
    }

    /// Attach a progress subscriber.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }

    fn emit_phase(&self, config: &RunConfig, iteration: u32, phase: RunPhase, status: PhaseStatus) {
        self.emit(ProgressEvent::iteration(
            iteration,
            config.max_iters,
            phase,
            status,
            config.models.clone(),
        ));
    }

    /// Execute one run to success, fallback success, or budget exhaustion.
    pub async fn run(&self, config: RunConfig) -> AppResult<RunOutcome> {
        let run = match self.store.start_run().await {
            Ok(run) => run,
            Err(err) => {
                self.emit(ProgressEvent::Error {
                    error: err.to_string(),
                    models: config.models.clone(),
                });
                return Err(err);
            }
        };

        tracing::info!(run_id = %run.run_id(), max_iters = config.max_iters, "run started");
        self.emit(ProgressEvent::Start {
            run_id: run.run_id().to_string(),
            max_iters: config.max_iters,
            models: config.models.clone(),
        });

        let mut memory = FailureMemory::new();
        let mut plan: Option<Plan> = None;
        let mut plan_approved_at: Option<u32> = None;
        let mut code_approved_at: Option<u32> = None;
        let mut tests_passed_at: Option<u32> = None;
        let mut current_html: Option<String> = None;
        let mut last_transformed: Option<String> = None;
        let mut last_smoke: Option<SmokeReport> = None;
        let mut failure_reports: Vec<FailureReport> = Vec::new();
        let mut history: Vec<IterationRecord> = Vec::new();
        let mut success = false;
        let mut fallback = false;
        let mut success_iteration = 0u32;

        for iteration in 1..=config.max_iters {
            let mut record = IterationRecord::new(iteration, Utc::now().to_rfc3339());
            let mut files = IterationFiles::default();
            let reports_before = failure_reports.len();
            let mut iteration_success = false;

            'phases: {
                // ── Plan + PlanCritique ─────────────────────────────
                if plan.is_none() {
                    self.emit_phase(&config, iteration, RunPhase::Plan, PhaseStatus::Working);
                    let planner_prompt =
                        build_planner_prompt(&config.prompt, &render_extra_directions(&memory));
                    files.prompt = Some(planner_prompt.clone());

                    let reply = match call_with_deadline(
                        self.model.as_ref(),
                        &config.models.planner,
                        &planner_prompt,
                        config.call_deadline,
                    )
                    .await
                    {
                        Ok(reply) => reply,
                        Err(err) => {
                            tracing::warn!(error = %err, iteration, "planner call failed");
                            record.record_outcome("plan", "model call failed");
                            failure_reports.push(FailureReport::new(
                                iteration,
                                "plan",
                                ReportSeverity::Medium,
                                err.to_string(),
                            ));
                            self.emit(ProgressEvent::Iteration {
                                iteration,
                                max_iters: config.max_iters,
                                phase: RunPhase::Plan,
                                status: PhaseStatus::Failed,
                                models: config.models.clone(),
                                issues: Vec::new(),
                                missing: Vec::new(),
                                errors: Vec::new(),
                                violations: Vec::new(),
                                fatal_error: Some(err.to_string()),
                            });
                            break 'phases;
                        }
                    };

                    let parsed = extract_json(&reply)
                        .map_err(|e| e.to_string())
                        .and_then(|value| Plan::from_value(value).map_err(|e| e.to_string()));
                    let new_plan = match parsed {
                        Ok(new_plan) => new_plan,
                        Err(message) => {
                            tracing::warn!(iteration, "planner reply was not a valid plan");
                            record.record_outcome("plan", "parse failed");
                            failure_reports.push(FailureReport::new(
                                iteration,
                                "plan",
                                ReportSeverity::Medium,
                                message,
                            ));
                            self.emit_phase(&config, iteration, RunPhase::Plan, PhaseStatus::Failed);
                            break 'phases;
                        }
                    };
                    record.plan = Some(new_plan.clone());
                    files.plan = serde_json::to_value(&new_plan).ok();

                    self.emit_phase(&config, iteration, RunPhase::PlanCritique, PhaseStatus::Working);
                    let critic_prompt = build_plan_critic_prompt(&config.prompt, &new_plan);
                    let verdict = run_critic(
                        self.model.as_ref(),
                        &config.models.critic,
                        &critic_prompt,
                        config.call_deadline,
                    )
                    .await;
                    files.plan_critique = serde_json::to_value(&verdict).ok();
                    record.plan_critique = Some(verdict.clone());

                    if !verdict.approved {
                        let issues = verdict.plan_issue_lines();
                        memory.record_plan_issues(issues.iter().cloned());
                        record.record_outcome("plan", "rejected");
                        failure_reports.push(FailureReport::new(
                            iteration,
                            "plan_critique",
                            severity_from_verdict(&verdict),
                            format!("plan rejected with {} issue(s)", issues.len()),
                        ));
                        self.emit(ProgressEvent::Iteration {
                            iteration,
                            max_iters: config.max_iters,
                            phase: RunPhase::PlanCritique,
                            status: PhaseStatus::Rejected,
                            models: config.models.clone(),
                            issues,
                            missing: Vec::new(),
                            errors: Vec::new(),
                            violations: Vec::new(),
                            fatal_error: None,
                        });
                        break 'phases;
                    }

                    record.record_outcome("plan", "approved");
                    if plan_approved_at.is_none() {
                        plan_approved_at = Some(iteration);
                    }
                    plan = Some(new_plan);
                    self.emit_phase(&config, iteration, RunPhase::Plan, PhaseStatus::Approved);
                }

                let Some(active_plan) = plan.clone() else {
                    break 'phases;
                };

                // ── CodeGen ─────────────────────────────────────────
                self.emit_phase(&config, iteration, RunPhase::Code, PhaseStatus::Working);
                let patch_mode = current_html.is_some()
                    && (memory.has_code_feedback()
                        || last_smoke.as_ref().is_some_and(|smoke| !smoke.passed));

                let coder_prompt = if patch_mode {
                    let html = current_html.as_deref().unwrap_or_default();
                    build_patch_prompt(
                        html,
                        &patch_fix_lines(&memory, last_smoke.as_ref()),
                        last_smoke.as_ref().map(|s| s.logs.clone()).unwrap_or_default().as_slice(),
                        &history.iter().map(IterationRecord::history_line).collect::<Vec<_>>(),
                    )
                } else {
                    build_coder_prompt(
                        &config.prompt,
                        &active_plan,
                        &render_extra_directions(&memory),
                        &config.library_catalog,
                    )
                };
                files.prompt = Some(coder_prompt.clone());

                let reply = match call_with_deadline(
                    self.model.as_ref(),
                    &config.models.coder,
                    &coder_prompt,
                    config.call_deadline,
                )
                .await
                {
                    Ok(reply) => reply,
                    Err(err) => {
                        tracing::warn!(error = %err, iteration, "coder call failed");
                        record.record_outcome("code", "model call failed");
                        failure_reports.push(FailureReport::new(
                            iteration,
                            "code",
                            ReportSeverity::Medium,
                            err.to_string(),
                        ));
                        self.emit(ProgressEvent::Iteration {
                            iteration,
                            max_iters: config.max_iters,
                            phase: RunPhase::Code,
                            status: PhaseStatus::Failed,
                            models: config.models.clone(),
                            issues: Vec::new(),
                            missing: Vec::new(),
                            errors: Vec::new(),
                            violations: Vec::new(),
                            fatal_error: Some(err.to_string()),
                        });
                        break 'phases;
                    }
                };

                let raw_html = extract_html(&reply);
                record.record_outcome("code", if patch_mode { "patched" } else { "generated" });

                // ── SecurityScan (always, right after CodeGen) ──────
                let scan = scan_html(&raw_html);
                // The transformer still runs on a failing document so the
                // final artifact stays inspectable.
                let transformed =
                    transform::apply(&raw_html, run.run_id(), &config.models.runtime);
                last_transformed = Some(transformed.clone());
                files.html = Some(transformed.clone());
                record.html = Some(transformed.clone());
                record.security_scan = Some(scan.clone());

                if !scan.passed {
                    let names = scan.violation_names();
                    tracing::warn!(iteration, violations = names.len(), "security scan failed; invalidating plan");
                    memory.record_security_errors(names.iter().cloned());
                    plan = None;
                    plan_approved_at = None;
                    current_html = None;
                    record.record_outcome("security_scan", "failed");
                    failure_reports.push(FailureReport::new(
                        iteration,
                        "security",
                        ReportSeverity::High,
                        scan.summary.clone(),
                    ));
                    self.emit(ProgressEvent::Iteration {
                        iteration,
                        max_iters: config.max_iters,
                        phase: RunPhase::SecurityScan,
                        status: PhaseStatus::SecurityFailed,
                        models: config.models.clone(),
                        issues: Vec::new(),
                        missing: Vec::new(),
                        errors: scan.structure_errors.clone(),
                        violations: names,
                        fatal_error: None,
                    });
                    break 'phases;
                }
                record.record_outcome("security_scan", "passed");
                current_html = Some(transformed.clone());
                self.emit_phase(&config, iteration, RunPhase::SecurityScan, PhaseStatus::Passed);

                // ── CodeCritique (advisory, never blocks) ───────────
                self.emit_phase(&config, iteration, RunPhase::CodeCritique, PhaseStatus::Working);
                let critic_prompt =
                    build_code_critic_prompt(&config.prompt, &active_plan, &transformed);
                let verdict = run_critic(
                    self.model.as_ref(),
                    &config.models.critic,
                    &critic_prompt,
                    config.call_deadline,
                )
                .await;
                files.code_critique = serde_json::to_value(&verdict).ok();
                record.code_critique = Some(verdict.clone());

                if verdict.approved {
                    if code_approved_at.is_none() {
                        code_approved_at = Some(iteration);
                    }
                    record.record_outcome("code_critique", "approved");
                    self.emit_phase(&config, iteration, RunPhase::CodeCritique, PhaseStatus::Approved);
                } else {
                    let issues = verdict.code_issue_lines();
                    memory.record_code_issues(issues.iter().cloned());
                    record.record_outcome("code_critique", "advisory issues");
                    failure_reports.push(FailureReport::new(
                        iteration,
                        "code_critique",
                        severity_from_verdict(&verdict),
                        format!("code critique raised {} issue(s)", issues.len()),
                    ));
                    self.emit(ProgressEvent::Iteration {
                        iteration,
                        max_iters: config.max_iters,
                        phase: RunPhase::CodeCritique,
                        status: PhaseStatus::AdvisoryIssues,
                        models: config.models.clone(),
                        issues,
                        missing: verdict.missing.clone(),
                        errors: Vec::new(),
                        violations: Vec::new(),
                        fatal_error: None,
                    });
                }

                // ── SmokeTest ───────────────────────────────────────
                self.emit_phase(&config, iteration, RunPhase::Tests, PhaseStatus::Working);
                let smoke = self.harness.run(&transformed, &active_plan).await;
                files.smoke_test = serde_json::to_value(&smoke).ok();
                record.smoke_result = Some(smoke.clone());

                if smoke.passed {
                    record.record_outcome("tests", if smoke.skipped { "skipped" } else { "passed" });
                    tests_passed_at = Some(iteration);
                    iteration_success = true;
                    self.emit_phase(&config, iteration, RunPhase::Tests, PhaseStatus::Passed);
                } else {
                    let severity = if smoke.critical_errors().is_empty() {
                        ReportSeverity::Medium
                    } else {
                        ReportSeverity::High
                    };
                    record.record_outcome("tests", "failed");
                    failure_reports.push(FailureReport::new(
                        iteration,
                        "tests",
                        severity,
                        format!(
                            "smoke test failed with {} structured error(s)",
                            smoke.structured_errors.len()
                        ),
                    ));
                    self.emit(ProgressEvent::Iteration {
                        iteration,
                        max_iters: config.max_iters,
                        phase: RunPhase::Tests,
                        status: PhaseStatus::Failed,
                        models: config.models.clone(),
                        issues: Vec::new(),
                        missing: Vec::new(),
                        errors: render_smoke_error_lines(&smoke.structured_errors),
                        violations: Vec::new(),
                        fatal_error: None,
                    });
                }
                last_smoke = Some(smoke);
            }

            // ── Fallback success ────────────────────────────────────
            let mut fallback_now = false;
            if !iteration_success
                && iteration >= fallback_threshold(config.max_iters)
                && plan.is_some()
            {
                let current = &failure_reports[reports_before..];
                let disqualified = current.iter().any(|report| {
                    report.severity == ReportSeverity::High || report.phase == "security"
                });
                if !disqualified {
                    tracing::info!(iteration, "declaring fallback success");
                    fallback_now = true;
                    iteration_success = true;
                }
            }

            // ── IterationSeal ───────────────────────────────────────
            record.success = iteration_success;
            record.end_ts = Utc::now().to_rfc3339();
            files.meta = Some(record.meta_value());
            if let Err(err) = run.write_iteration(iteration, files).await {
                tracing::warn!(error = %err, iteration, "iteration artifact write failed");
                failure_reports.push(FailureReport::new(
                    iteration,
                    "artifacts",
                    ReportSeverity::Low,
                    err.to_string(),
                ));
            }
            history.push(record);

            if iteration_success {
                success = true;
                fallback = fallback_now;
                success_iteration = iteration;
                self.emit(ProgressEvent::Success {
                    iteration,
                    fallback: fallback_now,
                    models: config.models.clone(),
                });
                break;
            }
        }

        // ── Finalize ────────────────────────────────────────────────
        let total_iterations = history.len() as u32;

        if let Some(final_plan) = &plan {
            if let Err(err) = run.write_final_plan(final_plan).await {
                tracing::warn!(error = %err, "final_plan.json write failed");
            }
        }

        let mut final_html_path = None;
        if let Some(html) = &last_transformed {
            match run.write_final_html(html).await {
                Ok(()) => final_html_path = Some(run.final_html_path()),
                Err(err) => {
                    tracing::error!(error = %err, "final.html write failed");
                    success = false;
                    failure_reports.push(FailureReport::new(
                        total_iterations.max(1),
                        "fatal",
                        ReportSeverity::High,
                        format!("final.html write failed: {err}"),
                    ));
                }
            }
        }

        let last_failure = failure_reports
            .last()
            .map(|report| format!("{}: {}", report.phase, report.message));
        let summary = RunSummary {
            run_id: run.run_id().to_string(),
            success,
            fallback,
            total_iterations,
            plan_approved_at,
            code_approved_at,
            tests_passed_at,
            last_failure,
            accumulated_security_errors: memory.security_errors().to_vec(),
            failure_reports: failure_reports.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        if let Err(err) = run.write_summary(&summary).await {
            tracing::error!(error = %err, "summary.json write failed");
            self.emit(ProgressEvent::Error {
                error: format!("summary write failed: {err}"),
                models: config.models.clone(),
            });
        }

        tracing::info!(
            run_id = %run.run_id(),
            success,
            fallback,
            total_iterations,
            success_iteration,
            "run finished"
        );
        self.emit(ProgressEvent::Complete {
            summary: summary.clone(),
            models: config.models.clone(),
        });

        Ok(RunOutcome {
            run_id: run.run_id().to_string(),
            success,
            final_plan: plan,
            final_html_path,
            summary,
            history,
            failure_reports,
            security_errors: memory.security_errors().to_vec(),
        })
    }
}

/// Fix lines for a patch prompt: latest smoke errors, the most recent
/// code-critique issues, and every accumulated security ban rendered with
/// its canonical fix hint.
fn patch_fix_lines(memory: &FailureMemory, last_smoke: Option<&SmokeReport>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(smoke) = last_smoke {
        lines.extend(render_smoke_error_lines(&smoke.structured_errors));
    }
    lines.extend(
        memory
            .recent_code_issues(PATCH_CODE_ISSUE_WINDOW)
            .iter()
            .map(|issue| format!("• {issue}")),
    );
    lines.extend(security_fix_lines(memory.security_errors()));
    lines
}

/// First iteration at which fallback success may be declared: ⌈0.75·max⌉.
fn fallback_threshold(max_iters: u32) -> u32 {
    (3 * max_iters).div_ceil(4)
}

/// High when any issue in the verdict is high-severity, medium otherwise.
fn severity_from_verdict(verdict: &CriticVerdict) -> ReportSeverity {
    if verdict.issues.iter().any(|issue| issue.severity == "high") {
        ReportSeverity::High
    } else {
        ReportSeverity::Medium
    }
}
