//! App Plan Model
//!
//! The plan is an open-ended structured object produced by the Planner and
//! consumed by the Coder and the smoke harness. Only three fields are
//! required; everything else the model emits (`description`, `state`,
//! `interactions`, `acceptance_criteria`, `libraries`, `data_bindings`,
//! `recommended_models`, ...) is preserved verbatim in `extra` and passed
//! through to downstream prompts untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Structured description of the app to build.
///
/// Required fields are typed; unknown fields round-trip through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// App title. Must be non-empty.
    pub title: String,
    /// Ordered page descriptors. Must be non-empty. Descriptors are open
    /// records (objects or plain strings depending on the model).
    pub pages: Vec<Value>,
    /// Component tags ("table", "form", "button", ...). Must be non-empty.
    pub ui_components: Vec<String>,
    /// Everything else the Planner emitted, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    /// Parse a plan from a JSON value and validate the required subset.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let plan: Plan = serde_json::from_value(value)
            .map_err(|e| CoreError::parse(format!("plan does not match schema: {e}")))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Validate the required-field subset.
    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::validation("plan title must be non-empty"));
        }
        if self.pages.is_empty() {
            return Err(CoreError::validation("plan must declare at least one page"));
        }
        if self.ui_components.is_empty() {
            return Err(CoreError::validation(
                "plan must declare at least one ui component",
            ));
        }
        Ok(())
    }

    /// Serialize the full plan (including preserved unknown fields) to a
    /// pretty JSON string for embedding in prompts and artifacts.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Optional data-binding descriptors, if the Planner emitted any.
    pub fn data_bindings(&self) -> Option<&Value> {
        self.extra.get("data_bindings").filter(|v| match v {
            Value::Null => false,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        })
    }

    /// Optional free-text description.
    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(|v| v.as_str())
    }

    /// Optional library names requested by the Planner.
    pub fn libraries(&self) -> Vec<String> {
        self.extra
            .get("libraries")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
