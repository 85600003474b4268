//! Inbound operation requests and caller credentials.

use serde::{Deserialize, Serialize};

use crate::{ArtifactKind, Parameter, Schedule};

/// An operation request as it arrives from the outer boundary.
///
/// Carries the artifact reference, the caller-supplied parameters and, for
/// scheduling, the schedule. Fields other than parameters are overwritten
/// from the stored record once the artifact is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRequest {
    pub kind: ArtifactKind,
    pub external_id: i64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub artifact_type: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

impl UsageRequest {
    pub fn new(kind: ArtifactKind, external_id: i64, name: impl Into<String>) -> Self {
        Self {
            kind,
            external_id,
            name: name.into(),
            path: String::new(),
            repo_url: String::new(),
            topics: Vec::new(),
            artifact_type: String::new(),
            parameters: Vec::new(),
            schedule: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = url.into();
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Look up a supplied parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Credentials of the caller on whose behalf an operation runs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Raw bearer token (without the `Bearer ` prefix).
    pub bearer_token: String,
    /// Personal access token used for repository access.
    pub personal_token: String,
    pub username: String,
}

impl Caller {
    pub fn new(
        bearer_token: impl Into<String>,
        personal_token: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            personal_token: personal_token.into(),
            username: username.into(),
        }
    }

    /// Extract the bearer token from an `Authorization` header value.
    ///
    /// Returns `None` unless the header has the form `Bearer <token>`.
    pub fn bearer_from_header(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }

    /// Header value for forwarding the bearer token.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("bearer_token", &"***")
            .field("personal_token", &"***")
            .field("username", &self.username)
            .finish()
    }
}
