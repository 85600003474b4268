//! Artifact records and the lifecycle vocabulary.
//!
//! Statuses are persisted as strings. The same logical status renders
//! differently per artifact kind (`WORKFLOW_EXECUTED` vs `APP_EXECUTED`), so
//! conversions always take the kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

// ─────────────────────────────────────────────────────────────────────────────
// Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The two kinds of managed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Automation task, executed on demand or on a schedule.
    Workflow,
    /// Longer-lived installed unit with start/stop semantics.
    App,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::App => "app",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    ToBeInstalled,
    Installed,
    ToBeExecuted,
    ToBeScheduled,
    Started,
    Stopped,
    Executed,
    Uninstalled,
    FailedToInstall,
    FailedToStart,
    FailedToStop,
    FailedToExecute,
    FailedToUninstall,
}

const WORKFLOW_CODES: [(Status, &str); 13] = [
    (Status::ToBeInstalled, "WORKFLOW_TO_BE_INSTALLED"),
    (Status::Installed, "WORKFLOW_INSTALLED"),
    (Status::ToBeExecuted, "WORKFLOW_TO_BE_EXECUTED"),
    (Status::ToBeScheduled, "WORKFLOW_TO_BE_SCHEDULED"),
    (Status::Started, "WORKFLOW_STARTED"),
    (Status::Stopped, "WORKFLOW_STOPPED"),
    (Status::Executed, "WORKFLOW_EXECUTED"),
    (Status::Uninstalled, "WORKFLOW_UNINSTALLED"),
    (Status::FailedToInstall, "FAILED_TO_INSTALL_WORKFLOW"),
    (Status::FailedToStart, "FAILED_TO_START_WORKFLOW"),
    (Status::FailedToStop, "FAILED_TO_STOP_WORKFLOW"),
    (Status::FailedToExecute, "FAILED_TO_EXECUTE_TASK"),
    (Status::FailedToUninstall, "FAILED_TO_UNINSTALL_WORKFLOW"),
];

const APP_CODES: [(Status, &str); 13] = [
    (Status::ToBeInstalled, "APP_TO_BE_INSTALLED"),
    (Status::Installed, "APP_INSTALLED"),
    (Status::ToBeExecuted, "APP_TO_BE_EXECUTED"),
    (Status::ToBeScheduled, "APP_TO_BE_SCHEDULED"),
    (Status::Started, "APP_STARTED"),
    (Status::Stopped, "APP_STOPPED"),
    (Status::Executed, "APP_EXECUTED"),
    (Status::Uninstalled, "APP_UNINSTALLED"),
    (Status::FailedToInstall, "FAILED_TO_INSTALL_APP"),
    (Status::FailedToStart, "FAILED_TO_START_APP"),
    (Status::FailedToStop, "FAILED_TO_STOP_APP"),
    (Status::FailedToExecute, "FAILED_TO_EXECUTE_APP"),
    (Status::FailedToUninstall, "FAILED_TO_UNINSTALL_APP"),
];

fn codes(kind: ArtifactKind) -> &'static [(Status, &'static str); 13] {
    match kind {
        ArtifactKind::Workflow => &WORKFLOW_CODES,
        ArtifactKind::App => &APP_CODES,
    }
}

impl Status {
    /// Persisted string for this status on an artifact of `kind`.
    pub fn code(self, kind: ArtifactKind) -> &'static str {
        codes(kind)
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, code)| *code)
            .unwrap_or("UNKNOWN")
    }

    /// Parse a persisted status string for an artifact of `kind`.
    pub fn from_code(kind: ArtifactKind, code: &str) -> Option<Self> {
        codes(kind)
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(status, _)| *status)
    }

    /// Whether this status records a failed operation.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FailedToInstall
                | Self::FailedToStart
                | Self::FailedToStop
                | Self::FailedToExecute
                | Self::FailedToUninstall
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation
// ─────────────────────────────────────────────────────────────────────────────

/// Operations a caller can request on an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Install,
    Start,
    Stop,
    Execute,
    Uninstall,
    Schedule,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Execute => "execute",
            Self::Uninstall => "uninstall",
            Self::Schedule => "schedule",
        }
    }

    /// Status recorded when the operation succeeds.
    pub fn target_status(self) -> Status {
        match self {
            Self::Install => Status::Installed,
            Self::Start => Status::Started,
            Self::Stop => Status::Stopped,
            Self::Execute => Status::Executed,
            Self::Uninstall => Status::Uninstalled,
            Self::Schedule => Status::ToBeScheduled,
        }
    }

    /// Status recorded when the operation's task run fails.
    pub fn failure_status(self) -> Status {
        match self {
            Self::Install => Status::FailedToInstall,
            Self::Start => Status::FailedToStart,
            Self::Stop => Status::FailedToStop,
            Self::Execute | Self::Schedule => Status::FailedToExecute,
            Self::Uninstall => Status::FailedToUninstall,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognized operation name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "execute" => Ok(Self::Execute),
            "uninstall" => Ok(Self::Uninstall),
            "schedule" => Ok(Self::Schedule),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifact
// ─────────────────────────────────────────────────────────────────────────────

/// App type that marks a record as removable through uninstall.
pub const INSTALLED_TYPE: &str = "installed";

/// A persisted workflow or app.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Internal identifier.
    pub id: String,
    /// Identifier of the backing source-control project.
    pub external_id: i64,
    pub kind: ArtifactKind,
    pub name: String,
    pub status: Status,
    pub workspace_id: String,
    pub timestamp: Timestamp,
    /// Repository path, relative to the kind's install root.
    pub path: String,
    pub repo_url: String,
    /// Free-form artifact type (apps use `installed`).
    pub artifact_type: String,
    /// Classification topics (`type=task`, `target=workspace`, ...).
    pub topics: Vec<String>,
}

impl Artifact {
    /// Persisted status string.
    pub fn status_code(&self) -> &'static str {
        self.status.code(self.kind)
    }

    pub fn is_installed_type(&self) -> bool {
        self.artifact_type == INSTALLED_TYPE
    }
}

/// Look up the value of a `key=value` classification topic.
///
/// The first topic whose key part contains `key` wins; topics without a
/// `=` separator are ignored.
pub fn topic_value<'a>(topics: &'a [String], key: &str) -> Option<&'a str> {
    topics.iter().find_map(|topic| {
        let (k, v) = topic.split_once('=')?;
        k.contains(key).then(|| v.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_per_kind() {
        assert_eq!(
            Status::Executed.code(ArtifactKind::Workflow),
            "WORKFLOW_EXECUTED"
        );
        assert_eq!(
            Status::FailedToExecute.code(ArtifactKind::Workflow),
            "FAILED_TO_EXECUTE_TASK"
        );
        assert_eq!(Status::Started.code(ArtifactKind::App), "APP_STARTED");
        assert_eq!(
            Status::FailedToInstall.code(ArtifactKind::App),
            "FAILED_TO_INSTALL_APP"
        );
    }

    #[test]
    fn test_status_from_code_is_kind_scoped() {
        assert_eq!(
            Status::from_code(ArtifactKind::Workflow, "WORKFLOW_INSTALLED"),
            Some(Status::Installed)
        );
        assert_eq!(
            Status::from_code(ArtifactKind::App, "WORKFLOW_INSTALLED"),
            None
        );
        assert_eq!(Status::from_code(ArtifactKind::App, "garbage"), None);
    }

    #[test]
    fn test_operation_statuses() {
        assert_eq!(Operation::Install.target_status(), Status::Installed);
        assert_eq!(Operation::Uninstall.target_status(), Status::Uninstalled);
        assert_eq!(Operation::Stop.failure_status(), Status::FailedToStop);
        assert!(Operation::Execute.failure_status().is_failure());
        assert!(!Operation::Execute.target_status().is_failure());
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("start".parse::<Operation>().unwrap(), Operation::Start);
        let err = "restart".parse::<Operation>().unwrap_err();
        assert_eq!(err.to_string(), "unknown operation 'restart'");
    }

    #[test]
    fn test_topic_value() {
        let topics = vec![
            "ai".to_string(),
            "type=task".to_string(),
            "target= workspace".to_string(),
        ];
        assert_eq!(topic_value(&topics, "type"), Some("task"));
        assert_eq!(topic_value(&topics, "target"), Some("workspace"));
        assert_eq!(topic_value(&topics, "owner"), None);
    }

    #[test]
    fn test_topic_value_ignores_bare_topics() {
        let topics = vec!["type".to_string()];
        assert_eq!(topic_value(&topics, "type"), None);
    }
}
