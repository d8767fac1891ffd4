//! Headless-Browser Smoke Backend
//!
//! chromiumoxide-driven implementation of the smoke protocol: load the
//! document in-memory, capture console errors and uncaught exceptions, check
//! the runtime-bridge surface, query the plan-derived selectors, and exercise
//! a bounded set of interactions. The browser is released on every exit path;
//! probe failures produce a failed report, never a leaked context.
//!
//! Only compiled with the `browser` cargo feature.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::Page;
use futures::StreamExt;

use dsstar_core::plan::Plan;

use crate::harness::{
    decide_pass, derive_selector_probes, is_harmless_console_error, missing_element_error,
    structured_console_error, ErrorSeverity, SelectorCheck, SmokeReport, StructuredError,
    BRIDGE_GLOBAL_CHECK,
};

/// Settle interval after the DOM parses, for deferred scripts.
const SETTLE_AFTER_LOAD: Duration = Duration::from_millis(1500);
/// Settle interval between probe interactions.
const SETTLE_BETWEEN_CLICKS: Duration = Duration::from_millis(300);
/// Post-interaction wait that captures late errors.
const SETTLE_AFTER_INTERACTIONS: Duration = Duration::from_millis(1000);

const MAX_BUTTON_CLICKS: usize = 5;
const MAX_INPUT_FILLS: usize = 3;

/// Run the full smoke protocol. `Err` means the browser itself was
/// unavailable (the caller reports a skipped pass); app-level failures come
/// back as a failed `SmokeReport`.
pub async fn run_smoke_test(html: &str, plan: &Plan) -> Result<SmokeReport, String> {
    let config = BrowserConfig::builder()
        .no_sandbox()
        .build()
        .map_err(|e| format!("browser config: {e}"))?;

    let (mut browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| format!("browser launch: {e}"))?;

    let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

    let outcome = probe_page(&browser, html, plan).await;

    // Release the context on every path before inspecting the outcome.
    let _ = browser.close().await;
    handler_task.abort();

    match outcome {
        Ok(report) => Ok(report),
        Err(message) => Ok(load_failed_report(message)),
    }
}

fn load_failed_report(message: String) -> SmokeReport {
    SmokeReport {
        passed: false,
        skipped: false,
        results: Vec::new(),
        logs: vec![message.clone()],
        structured_errors: vec![StructuredError {
            error_type: "LOAD_FAILED".to_string(),
            message,
            severity: ErrorSeverity::Critical,
            suggested_fix: "Produce a complete, well-formed HTML document".to_string(),
        }],
    }
}

async fn probe_page(browser: &Browser, html: &str, plan: &Plan) -> Result<SmokeReport, String> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| format!("new page: {e}"))?;

    let console_log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let mut console_events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("console listener: {e}"))?;
    let console_sink = Arc::clone(&console_log);
    let console_task = tokio::spawn(async move {
        while let Some(event) = console_events.next().await {
            if event.r#type == ConsoleApiCalledType::Error {
                let message = event
                    .args
                    .iter()
                    .filter_map(|arg| {
                        arg.value
                            .as_ref()
                            .map(|v| v.to_string())
                            .or_else(|| arg.description.clone())
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Ok(mut log) = console_sink.lock() {
                    log.push(message);
                }
            }
        }
    });

    let mut exception_events = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(|e| format!("exception listener: {e}"))?;
    let exception_sink = Arc::clone(&console_log);
    let exception_task = tokio::spawn(async move {
        while let Some(event) = exception_events.next().await {
            let details = &event.exception_details;
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            if let Ok(mut log) = exception_sink.lock() {
                log.push(message);
            }
        }
    });

    // 2. In-memory page set, then a settle interval for deferred scripts.
    page.set_content(html)
        .await
        .map_err(|e| format!("set content: {e}"))?;
    tokio::time::sleep(SETTLE_AFTER_LOAD).await;

    // 3. Runtime-bridge surface check.
    let bridge_ok = eval_bool(&page, BRIDGE_GLOBAL_CHECK).await.unwrap_or(false);

    // 4-5. Plan-derived selector probes.
    let probes = derive_selector_probes(plan);
    let mut results = Vec::with_capacity(probes.len());
    for probe in &probes {
        let expr = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(&probe.selector).unwrap_or_default()
        );
        let found = eval_bool(&page, &expr).await.unwrap_or(false);
        results.push(SelectorCheck {
            probe: probe.clone(),
            found,
        });
    }

    // 6. Interaction pass; failures here are recorded, never fatal.
    run_interactions(&page).await;

    // 7. Late-error capture window.
    tokio::time::sleep(SETTLE_AFTER_INTERACTIONS).await;

    console_task.abort();
    exception_task.abort();

    let logs: Vec<String> = console_log
        .lock()
        .map(|log| log.clone())
        .unwrap_or_default();

    Ok(build_report(bridge_ok, results, logs))
}

/// Assemble the report from captured data. Pure, so the decision logic is
/// testable without a browser.
fn build_report(bridge_ok: bool, results: Vec<SelectorCheck>, logs: Vec<String>) -> SmokeReport {
    let mut structured_errors: Vec<StructuredError> = Vec::new();

    if !bridge_ok {
        structured_errors.push(StructuredError {
            error_type: "BRIDGE_MISSING".to_string(),
            message: "runtime bridge (geaRuntimeLLM/geaRuntimeStore) is not on the global scope"
                .to_string(),
            severity: ErrorSeverity::Critical,
            suggested_fix: "Do not remove or rename the injected runtime-bridge script"
                .to_string(),
        });
    }

    let meaningful: Vec<&String> = logs
        .iter()
        .filter(|m| !is_harmless_console_error(m))
        .collect();
    for message in &meaningful {
        structured_errors.push(structured_console_error(message, "CONSOLE_ERROR"));
    }

    let mut missing_total = 0usize;
    let mut missing_critical = 0usize;
    for check in &results {
        if !check.found {
            missing_total += 1;
            if check.probe.critical {
                missing_critical += 1;
                structured_errors.push(missing_element_error(&check.probe));
            } else {
                tracing::debug!(label = %check.probe.label, "non-critical selector missing");
            }
        }
    }

    let critical_console = structured_errors
        .iter()
        .filter(|e| {
            e.severity == ErrorSeverity::Critical && e.error_type != "MISSING_ELEMENT"
        })
        .count();

    let passed = decide_pass(true, critical_console, missing_critical, missing_total);

    SmokeReport {
        passed,
        skipped: false,
        results,
        logs,
        structured_errors,
    }
}

async fn eval_bool(page: &Page, expr: &str) -> Option<bool> {
    page.evaluate(expr)
        .await
        .ok()
        .and_then(|result| result.into_value::<bool>().ok())
}

async fn eval_i64(page: &Page, expr: &str) -> Option<i64> {
    page.evaluate(expr)
        .await
        .ok()
        .and_then(|result| result.into_value::<i64>().ok())
}

/// Click up to five visible buttons, fill up to three text inputs, and pick
/// the second option of each select.
async fn run_interactions(page: &Page) {
    let button_count = eval_i64(
        page,
        "Array.from(document.querySelectorAll('button')).filter(b => b.offsetParent !== null).length",
    )
    .await
    .unwrap_or(0)
    .max(0) as usize;

    for index in 0..button_count.min(MAX_BUTTON_CLICKS) {
        let expr = format!(
            "(() => {{ const b = Array.from(document.querySelectorAll('button'))\
             .filter(b => b.offsetParent !== null)[{index}]; if (b) b.click(); return true; }})()"
        );
        let _ = eval_bool(page, &expr).await;
        tokio::time::sleep(SETTLE_BETWEEN_CLICKS).await;
    }

    let fill_expr = format!(
        "(() => {{ const inputs = Array.from(document.querySelectorAll(\
         \"input[type='text'], input:not([type]), textarea\")).slice(0, {MAX_INPUT_FILLS});\
         for (const i of inputs) {{ i.value = 'probe'; \
         i.dispatchEvent(new Event('input', {{bubbles: true}})); }} return true; }})()"
    );
    let _ = eval_bool(page, &fill_expr).await;

    let select_expr = "(() => { for (const s of document.querySelectorAll('select')) { \
         if (s.options.length > 1) { s.selectedIndex = 1; \
         s.dispatchEvent(new Event('change', {bubbles: true})); } } return true; })()";
    let _ = eval_bool(page, select_expr).await;
}
