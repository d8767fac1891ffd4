//! Critic Prompts
//!
//! Both critics are schema/security validators, not stylistic judges. Each
//! requests ONLY a JSON verdict object so the reply survives the normalizer.

use dsstar_core::plan::Plan;

use super::{security_restrictions, truncate_chars};

/// Prepended when a critic's first reply failed to parse as JSON.
pub const STRICT_JSON_RETRY_PREFIX: &str = "YOUR PREVIOUS REPLY WAS NOT VALID JSON. \
Reply with the JSON object ONLY: no prose, no markdown fences, no trailing text.\n\n";

/// Code excerpts embedded in critic prompts are capped at roughly 8 kB.
const HTML_EXCERPT_LIMIT: usize = 8_000;

const PLAN_CRITIC_CONTRACT: &str = r#"You are a plan validator for single-file internal web tools. Check the plan below against the user request: required fields present (non-empty title, pages, ui_components), components consistent with the request, and nothing that implies a banned capability. You are NOT a stylistic judge; approve any plan that is structurally sound and buildable.

Reply with ONLY this JSON shape:
{
  "approved": true | false,
  "issues": [{"severity": "high" | "medium" | "low", "area": "...", "message": "..."}],
  "suggestedPatchPrompt": "optional instruction for the planner"
}"#;

const CODE_CRITIC_CONTRACT: &str = r#"You are a code validator for single-file internal web tools. Check the HTML below against the plan: every planned ui component present, no banned API usage, interactions wired. You are NOT a stylistic judge; approve any document that implements the plan.

Reply with ONLY this JSON shape:
{
  "approved": true | false,
  "missing": ["component the plan names but the code lacks"],
  "issues": [{"severity": "high" | "medium" | "low", "message": "..."}],
  "fixInstructions": "optional concrete instructions for a patch"
}"#;

/// Build the Plan-Critic prompt.
pub fn build_plan_critic_prompt(user_prompt: &str, plan: &Plan) -> String {
    let mut prompt = String::new();
    prompt.push_str(PLAN_CRITIC_CONTRACT);
    prompt.push_str("\n\n");
    prompt.push_str(&security_restrictions());
    prompt.push_str("\nUSER REQUEST:\n");
    prompt.push_str(user_prompt.trim());
    prompt.push_str("\n\nPLAN TO VALIDATE:\n");
    prompt.push_str(&plan.to_pretty_json());
    prompt.push('\n');
    prompt
}

/// Build the Code-Critic prompt. The document is truncated to ~8 kB.
pub fn build_code_critic_prompt(user_prompt: &str, plan: &Plan, html: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(CODE_CRITIC_CONTRACT);
    prompt.push_str("\n\n");
    prompt.push_str(&security_restrictions());
    prompt.push_str("\nUSER REQUEST:\n");
    prompt.push_str(user_prompt.trim());
    prompt.push_str("\n\nPLAN:\n");
    prompt.push_str(&plan.to_pretty_json());
    prompt.push_str("\n\nHTML TO VALIDATE:\n");
    prompt.push_str(&truncate_chars(html, HTML_EXCERPT_LIMIT));
    prompt.push('\n');
    prompt
}
