//! Security Scanner
//!
//! Deterministic regex gate over a generated HTML document. Scans the raw
//! markup for banned tags, then extracts every `<script>` body and inline
//! event-handler value, strips comments and string literals, and scans the
//! sanitized text for banned call patterns. Never touches the network and
//! never calls a model.
//!
//! Stripping blanks characters to spaces instead of deleting them, keeping
//! quote characters and newlines in place. An originally empty string
//! literal therefore leaves an adjacent-quote footprint (`""`), which is
//! what the empty-URL leniency check looks for: `fetch("")` placeholder
//! stubs pass, `fetch("/api")` does not.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use dsstar_core::patterns::fix_hint;

/// One detected banned construct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    /// Canonical name from the banned-pattern vocabulary.
    pub name: String,
    /// Actionable replacement instruction.
    pub fix_hint: String,
    /// Number of occurrences outside comments/strings.
    pub count: usize,
    /// Short redacted excerpt around the first occurrence, for logs.
    pub snippet: String,
}

/// Scanner output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub passed: bool,
    pub security_violations: Vec<Violation>,
    pub structure_errors: Vec<String>,
    pub summary: String,
}

impl ScanReport {
    /// Canonical names of all violations, in detection order.
    pub fn violation_names(&self) -> Vec<String> {
        self.security_violations
            .iter()
            .map(|v| v.name.clone())
            .collect()
    }
}

struct TagRule {
    canonical: &'static str,
    regex: Regex,
}

struct CallRule {
    canonical: &'static str,
    regex: Regex,
    /// Whether the empty-URL leniency applies to this rule.
    lenient_on_empty_url: bool,
}

fn tag_rules() -> &'static Vec<TagRule> {
    static RULES: OnceLock<Vec<TagRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            TagRule {
                canonical: "<iframe>",
                regex: Regex::new(r"(?i)<iframe\b").expect("valid regex"),
            },
            TagRule {
                canonical: "<embed>",
                regex: Regex::new(r"(?i)<embed\b").expect("valid regex"),
            },
            TagRule {
                canonical: "<object>",
                regex: Regex::new(r"(?i)<object\b").expect("valid regex"),
            },
        ]
    })
}

fn call_rules() -> &'static Vec<CallRule> {
    static RULES: OnceLock<Vec<CallRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            CallRule {
                canonical: "fetch()",
                regex: Regex::new(r"\bfetch\s*\(").expect("valid regex"),
                lenient_on_empty_url: true,
            },
            CallRule {
                canonical: "axios",
                regex: Regex::new(r"\baxios\s*\.").expect("valid regex"),
                lenient_on_empty_url: true,
            },
            CallRule {
                canonical: "axios()",
                regex: Regex::new(r"\baxios\s*\(").expect("valid regex"),
                lenient_on_empty_url: true,
            },
            CallRule {
                canonical: "XMLHttpRequest",
                regex: Regex::new(r"\bXMLHttpRequest\b").expect("valid regex"),
                lenient_on_empty_url: false,
            },
            CallRule {
                canonical: "$.ajax()",
                regex: Regex::new(r"\$\.ajax\s*\(").expect("valid regex"),
                lenient_on_empty_url: false,
            },
            CallRule {
                canonical: "jQuery.ajax()",
                regex: Regex::new(r"\bjQuery\.ajax\s*\(").expect("valid regex"),
                lenient_on_empty_url: false,
            },
            CallRule {
                canonical: "eval()",
                regex: Regex::new(r"\beval\s*\(").expect("valid regex"),
                lenient_on_empty_url: false,
            },
            CallRule {
                canonical: "new Function()",
                regex: Regex::new(r"\bnew\s+Function\s*\(").expect("valid regex"),
                lenient_on_empty_url: false,
            },
        ]
    })
}

fn script_body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").expect("valid regex"))
}

fn inline_handler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Handler values may be double-quoted, single-quoted, or unquoted.
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\son[a-z]+\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
            .expect("valid regex")
    })
}

/// Scan an HTML document. The single entry point of this module.
pub fn scan_html(html: &str) -> ScanReport {
    let mut violations: Vec<Violation> = Vec::new();

    // 1. Banned tags on the raw markup.
    for rule in tag_rules() {
        let matches: Vec<_> = rule.regex.find_iter(html).collect();
        if !matches.is_empty() {
            violations.push(Violation {
                name: rule.canonical.to_string(),
                fix_hint: fix_hint(rule.canonical).to_string(),
                count: matches.len(),
                snippet: snippet_around(html, matches[0].start()),
            });
        }
    }

    // 2-3. Extract executable text and strip comments/strings.
    let executable = extract_executable_text(html);
    let sanitized = strip_comments_and_strings(&executable);

    // 4-5. Banned call patterns with empty-URL leniency.
    for rule in call_rules() {
        let matches: Vec<_> = rule.regex.find_iter(&sanitized).collect();
        if matches.is_empty() {
            continue;
        }
        if rule.lenient_on_empty_url
            && matches
                .iter()
                .all(|m| followed_by_empty_string_literal(&sanitized, m.end()))
        {
            tracing::debug!(pattern = rule.canonical, "suppressed empty-URL stub");
            continue;
        }
        violations.push(Violation {
            name: rule.canonical.to_string(),
            fix_hint: fix_hint(rule.canonical).to_string(),
            count: matches.len(),
            snippet: snippet_around(&sanitized, matches[0].start()),
        });
    }

    // 6. Basic structure.
    let mut structure_errors = Vec::new();
    let lower = html.to_lowercase();
    if !lower.contains("<!doctype") && !lower.contains("<html") {
        structure_errors.push("document has no <!DOCTYPE or <html root".to_string());
    }
    if !lower.contains("</html>") {
        structure_errors.push("document has no closing </html> tag".to_string());
    }

    let passed = violations.is_empty() && structure_errors.is_empty();
    let summary = if passed {
        "scan passed".to_string()
    } else {
        format!(
            "{} security violation(s), {} structure error(s)",
            violations.len(),
            structure_errors.len()
        )
    };

    if !passed {
        tracing::warn!(
            violations = violations.len(),
            structure = structure_errors.len(),
            "security scan failed"
        );
    }

    ScanReport {
        passed,
        security_violations: violations,
        structure_errors,
        summary,
    }
}

/// Concatenate every `<script>` body and every inline event-handler value.
fn extract_executable_text(html: &str) -> String {
    let mut out = String::new();
    for captures in script_body_regex().captures_iter(html) {
        if let Some(body) = captures.get(1) {
            out.push_str(body.as_str());
            out.push('\n');
        }
    }
    for captures in inline_handler_regex().captures_iter(html) {
        let value = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3));
        if let Some(value) = value {
            out.push_str(value.as_str());
            out.push('\n');
        }
    }
    out
}

/// Blank out comments and string-literal contents, preserving newlines and
/// the quote characters themselves. Supports `//`, `/* */`, `"`, `'`, and
/// backtick strings, with backslash-escape awareness.
fn strip_comments_and_strings(code: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        match state {
            State::Code => match ch {
                '/' if next == Some('/') => {
                    state = State::LineComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                '"' | '\'' | '`' => {
                    state = State::Str(ch);
                    out.push(ch);
                }
                _ => out.push(ch),
            },
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if ch == '*' && next == Some('/') {
                    state = State::Code;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                out.push(if ch == '\n' { '\n' } else { ' ' });
            }
            State::Str(quote) => {
                if ch == '\\' {
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                if ch == quote {
                    state = State::Code;
                    out.push(ch);
                } else {
                    out.push(if ch == '\n' { '\n' } else { ' ' });
                }
            }
        }
        i += 1;
    }
    out
}

/// Whether an adjacent-quote footprint (`""`, `''`, or ` `` `) appears within
/// ~20 characters after `pos` in sanitized text.
fn followed_by_empty_string_literal(sanitized: &str, pos: usize) -> bool {
    let window: String = sanitized[pos..].chars().take(20).collect();
    window.contains("\"\"") || window.contains("''") || window.contains("``")
}

/// Short single-line excerpt around a match position, for logs.
fn snippet_around(text: &str, pos: usize) -> String {
    let start = text[..pos]
        .char_indices()
        .rev()
        .take(10)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    let excerpt: String = text[start..]
        .chars()
        .take(60)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    excerpt.trim().to_string()
}
