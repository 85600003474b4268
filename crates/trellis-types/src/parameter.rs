//! Artifact parameters and workflow schedules.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Parameter name whose actual values list token aliases to resolve into
/// environment variables rather than task variables.
pub const TOKEN_PARAMETER: &str = "token";

/// A declared input of an artifact, with the values supplied at invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    /// Record id; `None` for parameters introduced by an install request.
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub usage: String,
    pub displayed: bool,
    /// Value type, e.g. `string` or `list`.
    #[serde(rename = "type")]
    pub value_type: String,
    pub format: String,
    pub default: String,
    pub required: bool,
    pub allowed_values: Vec<String>,
    pub masked: bool,
    pub actual_values: Vec<String>,
}

impl Parameter {
    /// Convenience constructor for a parameter carrying only values.
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            actual_values: values,
            ..Default::default()
        }
    }

    /// Whether this is the reserved token-alias parameter.
    pub fn is_token(&self) -> bool {
        self.name == TOKEN_PARAMETER
    }

    /// Actual values rendered the way task variables expect them.
    pub fn joined_values(&self) -> String {
        self.actual_values.join(", ")
    }
}

/// Execution schedule of a workflow. Unique per (workflow, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub workflow_id: String,
    /// Set to the workflow's name when stored.
    #[serde(default)]
    pub name: String,
    /// Run the workflow when the workspace starts.
    #[serde(default)]
    pub start: bool,
    /// Run the workflow when the workspace shuts down.
    #[serde(default)]
    pub end: bool,
    #[serde(default)]
    pub cron_expression: String,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_values() {
        let p = Parameter::with_values("cities", vec!["Oslo".into(), "Lima".into()]);
        assert_eq!(p.joined_values(), "Oslo, Lima");
        assert!(!p.is_token());
        assert!(Parameter::with_values("token", vec![]).is_token());
    }

    #[test]
    fn test_parameter_deserializes_sparse_json() {
        let p: Parameter =
            serde_json::from_str(r#"{"name":"ok_prompt","actual_values":["hello"]}"#).unwrap();
        assert_eq!(p.name, "ok_prompt");
        assert_eq!(p.id, None);
        assert_eq!(p.actual_values, vec!["hello"]);
    }

    #[test]
    fn test_schedule_defaults() {
        let s: Schedule = serde_json::from_str(r#"{"name":"nightly","start":true}"#).unwrap();
        assert!(s.start);
        assert!(!s.end);
        assert!(s.id.is_none());

        let unnamed: Schedule = serde_json::from_str(r#"{"end":true}"#).unwrap();
        assert!(unnamed.name.is_empty());
        assert!(unnamed.end);
    }
}
