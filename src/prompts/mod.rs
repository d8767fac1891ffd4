//! Prompt Builders
//!
//! Pure functions from run state to prompt strings. Builders never call
//! models; everything a model needs to avoid repeating a prior mistake is
//! rendered into the text verbatim, because model calls are stateless and
//! the failure memory is the only conversation there is.

mod coder;
mod critics;
mod patch;
mod planner;
mod render;

pub use coder::build_coder_prompt;
pub use critics::{build_code_critic_prompt, build_plan_critic_prompt, STRICT_JSON_RETRY_PREFIX};
pub use patch::build_patch_prompt;
pub use planner::build_planner_prompt;
pub use render::{render_extra_directions, render_smoke_error_lines, security_fix_lines};

use dsstar_core::patterns::BANNED_PATTERNS;

/// The restriction block every builder embeds.
pub(crate) fn security_restrictions() -> String {
    let mut out = String::from(
        "SECURITY RESTRICTIONS (enforced by a deterministic scanner — violations reject the output):\n",
    );
    for pattern in BANNED_PATTERNS {
        out.push_str(&format!("- {} is banned. {}\n", pattern.name, pattern.fix_hint));
    }
    out.push_str(
        "\nALLOWED CAPABILITIES:\n\
         - window.geaRuntimeLLM(prompt, {model}) -> Promise<string> for AI calls\n\
         - window.geaRuntimeStore.get(key) / .set(key, value) for persistence\n\
         - CDN <script>/<link> tags from cdn.jsdelivr.net, unpkg.com, cdnjs.cloudflare.com\n",
    );
    out
}

/// Truncate to at most `max` characters, marking the cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{kept}\n... [truncated]")
}
