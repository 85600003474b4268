//! Stable error codes and the response body shape built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every code a lifecycle operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    StatusOk,
    Unauthenticated,
    #[serde(rename = "INVALID_AWORKFLOW")]
    InvalidWorkflow,
    InvalidApp,
    ArtifactNotFound,
    WorkflowTypeIsMissing,
    WorkflowTargetIsMissing,
    WorkflowTypeIsNotSupported,
    WorkflowTargetIsNotSupported,
    FailedToInstallWorkflow,
    FailedToInstallApp,
    FailedToExecuteTask,
    FailedToStartApp,
    FailedToStopApp,
    FailedToExecuteApp,
    FailedToUninstallApp,
    FailedToSave,
    FailedToConnectToDb,
    FailedToRetrievePersonalToken,
    FailedToScheduleTask,
    FailedToParseWorkspaceId,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusOk => "STATUS_OK",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidWorkflow => "INVALID_AWORKFLOW",
            Self::InvalidApp => "INVALID_APP",
            Self::ArtifactNotFound => "ARTIFACT_NOT_FOUND",
            Self::WorkflowTypeIsMissing => "WORKFLOW_TYPE_IS_MISSING",
            Self::WorkflowTargetIsMissing => "WORKFLOW_TARGET_IS_MISSING",
            Self::WorkflowTypeIsNotSupported => "WORKFLOW_TYPE_IS_NOT_SUPPORTED",
            Self::WorkflowTargetIsNotSupported => "WORKFLOW_TARGET_IS_NOT_SUPPORTED",
            Self::FailedToInstallWorkflow => "FAILED_TO_INSTALL_WORKFLOW",
            Self::FailedToInstallApp => "FAILED_TO_INSTALL_APP",
            Self::FailedToExecuteTask => "FAILED_TO_EXECUTE_TASK",
            Self::FailedToStartApp => "FAILED_TO_START_APP",
            Self::FailedToStopApp => "FAILED_TO_STOP_APP",
            Self::FailedToExecuteApp => "FAILED_TO_EXECUTE_APP",
            Self::FailedToUninstallApp => "FAILED_TO_UNINSTALL_APP",
            Self::FailedToSave => "FAILED_TO_SAVE",
            Self::FailedToConnectToDb => "FAILED_TO_CONNECT_TO_DB",
            Self::FailedToRetrievePersonalToken => "FAILED_TO_RETRIEVE_PERSONAL_TOKEN",
            Self::FailedToScheduleTask => "FAILED_TO_SCHEDULE_TASK",
            Self::FailedToParseWorkspaceId => "FAILED_TO_PARSE_WORKSPACE_ID",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body rendered for every operation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "Code")]
    pub code: ErrorCode,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

impl ResponseBody {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::StatusOk,
            message: message.into(),
            output: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: Option<serde_json::Value>) -> Self {
        self.output = output;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::StatusOk
    }
}
