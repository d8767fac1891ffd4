//! Banned-Pattern Vocabulary
//!
//! The canonical names for constructs the security scanner rejects, each with
//! exactly one human-readable fix hint. The same table feeds the scanner's
//! violation records, the patch-prompt renderer, and the logs, so a model
//! always sees the same actionable instruction for a given ban.

/// One banned construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannedPattern {
    /// Canonical name, e.g. `fetch()` or `<iframe>`.
    pub name: &'static str,
    /// Actionable replacement instruction.
    pub fix_hint: &'static str,
}

/// The full vocabulary. Order is stable and mirrors scan order: tags first,
/// then call patterns.
pub const BANNED_PATTERNS: &[BannedPattern] = &[
    BannedPattern {
        name: "<iframe>",
        fix_hint: "Remove the <iframe> and render the content inline instead",
    },
    BannedPattern {
        name: "<embed>",
        fix_hint: "Remove the <embed> element; external embeds are not allowed",
    },
    BannedPattern {
        name: "<object>",
        fix_hint: "Remove the <object> element; external embeds are not allowed",
    },
    BannedPattern {
        name: "fetch()",
        fix_hint: "Use window.geaRuntimeLLM() for AI calls",
    },
    BannedPattern {
        name: "axios",
        fix_hint: "Remove axios; use window.geaRuntimeLLM() and window.geaRuntimeStore instead",
    },
    BannedPattern {
        name: "axios()",
        fix_hint: "Remove axios; use window.geaRuntimeLLM() and window.geaRuntimeStore instead",
    },
    BannedPattern {
        name: "XMLHttpRequest",
        fix_hint: "Use window.geaRuntimeStore.get()/set() for data instead of raw HTTP",
    },
    BannedPattern {
        name: "$.ajax()",
        fix_hint: "Use window.geaRuntimeLLM() and window.geaRuntimeStore instead of jQuery AJAX",
    },
    BannedPattern {
        name: "jQuery.ajax()",
        fix_hint: "Use window.geaRuntimeLLM() and window.geaRuntimeStore instead of jQuery AJAX",
    },
    BannedPattern {
        name: "eval()",
        fix_hint: "Remove eval(); write the logic out directly",
    },
    BannedPattern {
        name: "new Function()",
        fix_hint: "Remove new Function(); define functions statically",
    },
];

/// Look up the fix hint for a canonical name. Unknown names get a generic
/// removal instruction so a renderer never produces an empty line.
pub fn fix_hint(name: &str) -> &'static str {
    BANNED_PATTERNS
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.fix_hint)
        .unwrap_or("Remove this banned construct")
}
