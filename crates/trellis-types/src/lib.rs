//! Shared domain types for the Trellis workspace engine.
//!
//! Artifacts (workflows and apps), their parameters and schedules, the
//! operation/status vocabulary, and the stable error codes surfaced to
//! callers all live here so every other crate speaks the same language.

pub mod artifact;
pub mod code;
pub mod parameter;
pub mod request;

pub use artifact::{
    Artifact, ArtifactKind, INSTALLED_TYPE, Operation, Status, UnknownOperation, topic_value,
};
pub use code::{ErrorCode, ResponseBody};
pub use parameter::{Parameter, Schedule, TOKEN_PARAMETER};
pub use request::{Caller, UsageRequest};

/// Timestamp type used on every persisted record.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
