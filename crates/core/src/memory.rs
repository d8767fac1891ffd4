//! Failure Memory
//!
//! Model calls are independent and stateless, so the memory lists act as the
//! conversation: every violation and critique issue seen during a run is
//! rendered verbatim into subsequent Planner and Patch prompts. Lists are
//! append-only and de-duplicated; within a run they are never reordered and
//! never shrink.

use serde::{Deserialize, Serialize};

/// Per-run accumulated failure memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureMemory {
    security_errors: Vec<String>,
    plan_critique_issues: Vec<String>,
    code_critique_issues: Vec<String>,
}

impl FailureMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record canonical banned-pattern names from a security scan.
    pub fn record_security_errors<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            push_unique(&mut self.security_errors, name.into());
        }
    }

    /// Record plan-critique issues, already rendered as `[severity] area: message`.
    pub fn record_plan_issues<I, S>(&mut self, issues: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for issue in issues {
            push_unique(&mut self.plan_critique_issues, issue.into());
        }
    }

    /// Record code-critique issues, already rendered as `[severity] message`
    /// or `Missing: <item>`.
    pub fn record_code_issues<I, S>(&mut self, issues: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for issue in issues {
            push_unique(&mut self.code_critique_issues, issue.into());
        }
    }

    pub fn security_errors(&self) -> &[String] {
        &self.security_errors
    }

    pub fn plan_critique_issues(&self) -> &[String] {
        &self.plan_critique_issues
    }

    pub fn code_critique_issues(&self) -> &[String] {
        &self.code_critique_issues
    }

    /// The most recent `n` code-critique issues, oldest first.
    pub fn recent_code_issues(&self, n: usize) -> &[String] {
        let start = self.code_critique_issues.len().saturating_sub(n);
        &self.code_critique_issues[start..]
    }

    /// Whether a patch cycle has anything to work from.
    pub fn has_code_feedback(&self) -> bool {
        !self.security_errors.is_empty() || !self.code_critique_issues.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.security_errors.is_empty()
            && self.plan_critique_issues.is_empty()
            && self.code_critique_issues.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.iter().any(|existing| existing == &entry) {
        list.push(entry);
    }
}
