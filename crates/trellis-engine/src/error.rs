//! Lifecycle errors and their stable codes.

use thiserror::Error;
use trellis_config::ConfigError;
use trellis_store::StoreError;
use trellis_types::{ArtifactKind, ErrorCode, Operation, ResponseBody};

use crate::repo::RepoError;
use crate::tokens::TokenError;

/// Error type for lifecycle operations.
///
/// Every variant maps onto exactly one [`ErrorCode`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing or malformed caller credentials")]
    Unauthenticated,

    #[error("Invalid {kind} request: {reason}")]
    InvalidRequest { kind: ArtifactKind, reason: String },

    #[error("The {kind} {external_id} is not installed")]
    NotFound { kind: ArtifactKind, external_id: i64 },

    #[error("The {kind} has no type topic")]
    TypeMissing { kind: ArtifactKind },

    #[error("The {kind} has no target topic")]
    TargetMissing { kind: ArtifactKind },

    #[error("The type '{value}' is not supported for a {kind}")]
    UnsupportedType { kind: ArtifactKind, value: String },

    #[error("The target '{value}' is not supported for a {kind}")]
    UnsupportedTarget { kind: ArtifactKind, value: String },

    #[error("Failed to install the {kind}: {source}")]
    Install {
        kind: ArtifactKind,
        #[source]
        source: RepoError,
    },

    #[error("Failed to execute the task with status code: {exit_code}. Report: {report_url}")]
    TaskFailed {
        kind: ArtifactKind,
        operation: Operation,
        exit_code: i32,
        report_url: String,
    },

    #[error("Failed to execute the task ({message}). Report: {report_url}")]
    TaskSpawn {
        kind: ArtifactKind,
        operation: Operation,
        message: String,
        report_url: String,
    },

    #[error("Failed to retrieve the '{alias}' token: {source}")]
    Token {
        alias: String,
        #[source]
        source: TokenError,
    },

    #[error("Failed to save the {kind}: {reason}")]
    SaveFailed { kind: ArtifactKind, reason: String },

    #[error("Failed to schedule the workflow: {0}")]
    Schedule(String),

    #[error("Invalid workspace id '{0}'")]
    WorkspaceId(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to update the workspace configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Stable code reported to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::InvalidRequest { kind, .. } => match kind {
                ArtifactKind::Workflow => ErrorCode::InvalidWorkflow,
                ArtifactKind::App => ErrorCode::InvalidApp,
            },
            Self::NotFound { .. } => ErrorCode::ArtifactNotFound,
            Self::TypeMissing { .. } => ErrorCode::WorkflowTypeIsMissing,
            Self::TargetMissing { .. } => ErrorCode::WorkflowTargetIsMissing,
            Self::UnsupportedType { .. } => ErrorCode::WorkflowTypeIsNotSupported,
            Self::UnsupportedTarget { .. } => ErrorCode::WorkflowTargetIsNotSupported,
            Self::Install { kind, .. } => match kind {
                ArtifactKind::Workflow => ErrorCode::FailedToInstallWorkflow,
                ArtifactKind::App => ErrorCode::FailedToInstallApp,
            },
            Self::TaskFailed {
                kind, operation, ..
            }
            | Self::TaskSpawn {
                kind, operation, ..
            } => failure_code(*kind, *operation),
            Self::Token { .. } => ErrorCode::FailedToRetrievePersonalToken,
            Self::SaveFailed { .. } => ErrorCode::FailedToSave,
            Self::Schedule(_) => ErrorCode::FailedToScheduleTask,
            Self::WorkspaceId(_) => ErrorCode::FailedToParseWorkspaceId,
            Self::Store(_) => ErrorCode::FailedToConnectToDb,
            Self::Config(_) => ErrorCode::FailedToSave,
        }
    }

    /// Public report URL, when the failure happened after the task ran.
    pub fn report_url(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { report_url, .. } | Self::TaskSpawn { report_url, .. } => {
                Some(report_url)
            }
            _ => None,
        }
    }

    /// Exit code of a failed task run.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::TaskFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Response body carrying the code and message.
    pub fn response(&self) -> ResponseBody {
        ResponseBody::error(self.code(), self.to_string())
    }
}

/// Code reported when a task run for `operation` fails.
pub fn failure_code(kind: ArtifactKind, operation: Operation) -> ErrorCode {
    match (kind, operation) {
        (ArtifactKind::Workflow, Operation::Schedule) => ErrorCode::FailedToScheduleTask,
        (ArtifactKind::Workflow, _) => ErrorCode::FailedToExecuteTask,
        (ArtifactKind::App, Operation::Install) => ErrorCode::FailedToInstallApp,
        (ArtifactKind::App, Operation::Start) => ErrorCode::FailedToStartApp,
        (ArtifactKind::App, Operation::Stop) => ErrorCode::FailedToStopApp,
        (ArtifactKind::App, Operation::Uninstall) => ErrorCode::FailedToUninstallApp,
        (ArtifactKind::App, _) => ErrorCode::FailedToExecuteApp,
    }
}
