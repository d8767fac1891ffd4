//! Coder Prompt
//!
//! Asks the Coder role for one complete HTML document implementing the
//! approved plan. Includes worked examples for the runtime bridge so the
//! model reaches for it instead of banned network primitives.

use dsstar_core::plan::Plan;

use super::security_restrictions;

const CODER_CONTRACT: &str = r#"You are implementing a single-file internal web tool. Reply with ONLY the raw HTML document — no prose, no markdown fences, nothing before <!DOCTYPE html> and nothing after </html>.

DOCUMENT RULES:
- One self-contained .html file: inline <style> and <script> only.
- Libraries load from approved CDNs (cdn.jsdelivr.net, unpkg.com,
  cdnjs.cloudflare.com) via plain <script src> / <link href> tags.
- Every ui component the plan names must render as a real DOM element.
- Wire interactions with addEventListener or inline handlers; the app must
  work when opened directly, with no server.

RUNTIME BRIDGE (already provided by the host — call it, never define it):

  // AI call
  const answer = await window.geaRuntimeLLM("Summarize: " + text);

  // Persistence
  await window.geaRuntimeStore.set("items", items);
  const items = (await window.geaRuntimeStore.get("items")) || [];"#;

/// Build the Coder prompt for a fresh (non-patch) generation.
pub fn build_coder_prompt(
    user_prompt: &str,
    plan: &Plan,
    extra_directions: &str,
    library_catalog: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(CODER_CONTRACT);
    prompt.push_str("\n\n");
    prompt.push_str(&security_restrictions());

    if !library_catalog.trim().is_empty() {
        prompt.push_str("\nAVAILABLE LIBRARIES:\n");
        prompt.push_str(library_catalog.trim());
        prompt.push('\n');
    }

    if !extra_directions.trim().is_empty() {
        prompt.push_str("\nLEARN FROM EARLIER FAILURES IN THIS RUN:\n");
        prompt.push_str(extra_directions.trim());
        prompt.push('\n');
    }

    prompt.push_str("\nAPPROVED PLAN:\n");
    prompt.push_str(&plan.to_pretty_json());
    prompt.push_str("\n\nUSER REQUEST:\n");
    prompt.push_str(user_prompt.trim());
    prompt.push('\n');
    prompt
}
