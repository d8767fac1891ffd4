//! LLM-Backed Critics
//!
//! Plan-Critic and Code-Critic share one adapter: call the model, run the
//! normalizer's JSON path on the reply, and normalize to a verdict. Critics
//! are advisors with a deterministic failure mode: if the model is
//! unreachable or twice fails to produce JSON, the verdict defaults to
//! approved so a missing advisory never blocks the pipeline. The Plan-Critic
//! verdict gates progression; the Code-Critic verdict is advisory only.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dsstar_llm::provider::{call_with_deadline, ModelClient};

use crate::normalize::extract_json;
use crate::prompts::STRICT_JSON_RETRY_PREFIX;

/// One issue raised by a critic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticIssue {
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub message: String,
}

/// Normalized critic verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub approved: bool,
    pub issues: Vec<CriticIssue>,
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_patch_prompt: Option<String>,
    /// The raw reply, attached when it could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl CriticVerdict {
    /// Default verdict when the critic cannot be consulted.
    pub fn unavailable(note: &str) -> Self {
        Self {
            approved: true,
            issues: vec![CriticIssue {
                severity: "low".to_string(),
                area: None,
                message: format!("critic unavailable: {note}"),
            }],
            missing: Vec::new(),
            fix_instructions: None,
            suggested_patch_prompt: None,
            raw: None,
        }
    }

    /// Parse a verdict from normalized JSON.
    fn from_value(value: &Value) -> Self {
        let issues = value
            .get("issues")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(parse_issue).collect())
            .unwrap_or_default();

        let missing = value
            .get("missing")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            approved: value.get("approved").and_then(|v| v.as_bool()).unwrap_or(false),
            issues,
            missing,
            fix_instructions: value
                .get("fixInstructions")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            suggested_patch_prompt: value
                .get("suggestedPatchPrompt")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw: None,
        }
    }

    /// Issue lines in plan-critique memory form: `[severity] area: message`.
    pub fn plan_issue_lines(&self) -> Vec<String> {
        self.issues
            .iter()
            .map(|issue| {
                format!(
                    "[{}] {}: {}",
                    issue.severity,
                    issue.area.as_deref().unwrap_or("general"),
                    issue.message
                )
            })
            .collect()
    }

    /// Issue lines in code-critique memory form: `[severity] message` plus
    /// `Missing: <item>` for every missing component.
    pub fn code_issue_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .issues
            .iter()
            .map(|issue| format!("[{}] {}", issue.severity, issue.message))
            .collect();
        lines.extend(self.missing.iter().map(|item| format!("Missing: {item}")));
        lines
    }
}

fn parse_issue(value: &Value) -> CriticIssue {
    match value {
        Value::String(s) => CriticIssue {
            severity: "medium".to_string(),
            area: None,
            message: s.clone(),
        },
        _ => CriticIssue {
            severity: value
                .get("severity")
                .and_then(|v| v.as_str())
                .unwrap_or("medium")
                .to_lowercase(),
            area: value
                .get("area")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified issue")
                .to_string(),
        },
    }
}

/// Call a critic model and normalize the reply. One strict retry on parse
/// failure; unavailability and double parse failure default to approved.
pub async fn run_critic(
    client: &dyn ModelClient,
    model: &str,
    prompt: &str,
    deadline: Duration,
) -> CriticVerdict {
    let reply = match call_with_deadline(client, model, prompt, deadline).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(error = %err, "critic call failed; defaulting to approved");
            return CriticVerdict::unavailable(&err.to_string());
        }
    };

    if let Ok(value) = extract_json(&reply) {
        return CriticVerdict::from_value(&value);
    }

    tracing::debug!("critic reply was not JSON; retrying with strict instruction");
    let strict_prompt = format!("{STRICT_JSON_RETRY_PREFIX}{prompt}");
    let retry = match call_with_deadline(client, model, &strict_prompt, deadline).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(error = %err, "critic retry failed; defaulting to approved");
            return CriticVerdict::unavailable(&err.to_string());
        }
    };

    match extract_json(&retry) {
        Ok(value) => CriticVerdict::from_value(&value),
        Err(_) => {
            tracing::warn!("critic produced no parseable JSON twice; defaulting to approved");
            let mut verdict = CriticVerdict::unavailable("reply was not parseable JSON");
            verdict.raw = Some(retry);
            verdict
        }
    }
}
