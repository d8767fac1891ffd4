//! Planner Prompt
//!
//! Asks the Planner role for a single JSON plan object. Accumulated failure
//! memory arrives pre-rendered as `extra_directions` and is embedded
//! verbatim so the model sees its own prior violations.

use super::security_restrictions;

const PLANNER_CONTRACT: &str = r#"You are planning a single-file internal web tool. Reply with ONE JSON object and nothing else — no prose, no markdown fences.

REQUIRED FIELDS:
{
  "title": "short app title",
  "pages": [{"name": "...", "purpose": "..."}],
  "ui_components": ["table", "form", "button", ...]
}

OPTIONAL FIELDS (include when useful):
  "description", "state", "interactions", "acceptance_criteria",
  "libraries", "data_bindings", "recommended_models"

ALLOWED LIBRARY CATEGORIES (loaded from approved CDNs only):
  css framework, charting, date/time, icons, utility. Name concrete
  libraries in "libraries" (e.g. "chart.js"); never propose bundlers,
  servers, or anything requiring a build step."#;

/// Build the Planner prompt.
pub fn build_planner_prompt(user_prompt: &str, extra_directions: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(PLANNER_CONTRACT);
    prompt.push_str("\n\n");
    prompt.push_str(&security_restrictions());

    if !extra_directions.trim().is_empty() {
        prompt.push_str("\nLEARN FROM EARLIER FAILURES IN THIS RUN:\n");
        prompt.push_str(extra_directions.trim());
        prompt.push('\n');
    }

    prompt.push_str("\nUSER REQUEST:\n");
    prompt.push_str(user_prompt.trim());
    prompt.push('\n');
    prompt
}
