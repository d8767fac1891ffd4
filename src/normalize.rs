//! Response Normalizer
//!
//! Model replies arrive wrapped in fences, prose, or slightly broken JSON.
//! Two extractors recover the payload:
//!
//! - `extract_html` never fails: it tries the document as-is, the first
//!   fenced block, the `<!DOCTYPE`..`</html>` slice, then falls back to the
//!   trimmed input.
//! - `extract_json` tries direct parse, the first fenced block, and the
//!   outermost brace slice, then repeats all three through a permissive
//!   repair pass. Exhausting every strategy is an `InvalidPlan` error that
//!   carries the raw reply.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, AppResult};

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
    })
}

/// Extract an HTML document from a model reply. Never fails.
pub fn extract_html(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("<!doctype") || lower.starts_with("<html") {
        return raw.to_string();
    }

    if let Some(captures) = fence_regex().captures(raw) {
        if let Some(body) = captures.get(1) {
            let body = body.as_str().trim();
            if !body.is_empty() {
                return body.to_string();
            }
        }
    }

    let haystack = raw.to_lowercase();
    let start = haystack.find("<!doctype").or_else(|| haystack.find("<html"));
    if let Some(start) = start {
        if let Some(end) = haystack[start..].find("</html>") {
            return raw[start..start + end + "</html>".len()].to_string();
        }
    }

    trimmed.to_string()
}

/// Extract a JSON object from a model reply.
pub fn extract_json(raw: &str) -> AppResult<Value> {
    let candidates = json_candidates(raw);

    for candidate in &candidates {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }
    }

    for candidate in &candidates {
        let repaired = repair_json(candidate);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            return Ok(value);
        }
    }

    Err(AppError::invalid_plan(raw))
}

/// The three extraction candidates, in priority order.
fn json_candidates(raw: &str) -> Vec<String> {
    let mut candidates = vec![raw.trim().to_string()];

    if let Some(captures) = fence_regex().captures(raw) {
        if let Some(body) = captures.get(1) {
            candidates.push(body.as_str().trim().to_string());
        }
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            candidates.push(raw[start..=end].to_string());
        }
    }

    candidates.retain(|c| !c.is_empty());
    candidates
}

fn unquoted_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).expect("valid regex")
    })
}

fn single_quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^'\\]*)'").expect("valid regex"))
}

fn trailing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("valid regex"))
}

/// Permissive JSON repair: smart quotes, control characters, single quotes,
/// unquoted keys, trailing commas, and truncated output.
fn repair_json(input: &str) -> String {
    let mut fixed = input
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'");

    fixed = fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    fixed = single_quoted_regex()
        .replace_all(&fixed, "\"$1\"")
        .to_string();
    fixed = unquoted_key_regex()
        .replace_all(&fixed, "$1\"$2\":")
        .to_string();
    fixed = trailing_comma_regex().replace_all(&fixed, "$1").to_string();

    close_truncated(&fixed)
}

/// Close an unterminated string and balance unclosed braces/brackets so a
/// truncated reply still parses.
fn close_truncated(input: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    // A truncated reply may end mid-pair; drop a dangling comma or colon.
    while out.ends_with(',') || out.ends_with(':') {
        out.pop();
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
