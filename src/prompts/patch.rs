//! Patch Prompt
//!
//! Asks the Coder role for the complete fixed document. The prompt leads
//! with what went wrong: rendered fix lines, the latest smoke-test console
//! errors, and the chronological attempt history, so the model stops
//! repeating listed mistakes.

use super::security_restrictions;

const PATCH_CONTRACT: &str = r#"The single-file web tool below failed verification. Produce the COMPLETE fixed HTML document — reply with ONLY the raw HTML, no prose, no markdown fences. Keep everything that already works; change only what the problems below require. Do not repeat ANY mistake listed here."#;

/// Build the Patch prompt.
pub fn build_patch_prompt(
    html: &str,
    fix_lines: &[String],
    console_errors: &[String],
    attempt_history: &[String],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(PATCH_CONTRACT);
    prompt.push_str("\n\n");
    prompt.push_str(&security_restrictions());

    if !fix_lines.is_empty() {
        prompt.push_str("\nPROBLEMS TO FIX:\n");
        for line in fix_lines {
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    if !console_errors.is_empty() {
        prompt.push_str("\nCONSOLE ERRORS FROM THE LAST TEST RUN:\n");
        for error in console_errors {
            prompt.push_str("- ");
            prompt.push_str(error);
            prompt.push('\n');
        }
    }

    if !attempt_history.is_empty() {
        prompt.push_str("\nATTEMPT HISTORY (oldest first):\n");
        for line in attempt_history {
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nCURRENT DOCUMENT:\n");
    prompt.push_str(html);
    prompt.push('\n');
    prompt
}
