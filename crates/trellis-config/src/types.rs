//! Configuration types.
//!
//! ```toml
//! platform_domain = "platform.example.io"
//!
//! [workspace]
//! id = "3f1c8a52-5f8e-4bd0-9a43-0d6c2a1b7e90"
//! type = "base"
//!
//! [workflow]
//! installation_folder = "/work/workflows"
//! production_branch = "production"
//!
//! [[workflow.env]]
//! name = "HTTP_PROXY"
//! value = "http://proxy:3128"
//!
//! [engine]
//! version = "1.4.0"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trellis_types::{ArtifactKind, UsageRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Root Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Root of `workspace.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Public domain used for report URLs and passed to every task.
    pub platform_domain: String,
    pub workspace: WorkspaceSection,
    pub database: DatabaseConfig,
    pub workflow: ArtifactRootConfig,
    pub app: ArtifactRootConfig,
    pub task_runner: TaskRunnerConfig,
    pub engine: EngineConfig,
    pub guard: ComponentConfig,
    pub frontend: ComponentConfig,
    pub workspace_service: ServiceConfig,
    pub identity: IdentityConfig,
    pub package_repo: PackageRepoConfig,
    pub update: UpdateConfig,
    pub logging: LoggingConfig,
    /// Apps provisioned when the workspace launches.
    pub bundled_apps: Vec<BundledApp>,
}

impl WorkspaceConfig {
    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Root configuration for an artifact kind.
    pub fn artifact_root(&self, kind: ArtifactKind) -> &ArtifactRootConfig {
        match kind {
            ArtifactKind::Workflow => &self.workflow,
            ArtifactKind::App => &self.app,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

/// Launch has not happened yet.
pub const LAUNCH_PENDING: u8 = 0;
/// Startup workflows were picked up by the running engine.
pub const LAUNCH_SCHEDULED: u8 = 1;
/// Startup workflows ran; they are not repeated on later launches.
pub const LAUNCH_COMPLETED: u8 = 2;

/// Identity of this workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Workspace UUID, as issued by the workspace service.
    pub id: String,
    pub domain: String,
    /// Workspace flavor reported to the update service.
    #[serde(rename = "type")]
    pub workspace_type: String,
    /// One of [`LAUNCH_PENDING`], [`LAUNCH_SCHEDULED`], [`LAUNCH_COMPLETED`].
    pub first_time_launched: u8,
}

/// Embedded database location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the database file.
    pub path: PathBuf,
    pub file_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db"),
            file_name: "engine.db".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn file_path(&self) -> PathBuf {
        self.path.join(&self.file_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifacts
// ─────────────────────────────────────────────────────────────────────────────

/// Where and from which branch artifacts of one kind are installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactRootConfig {
    pub installation_folder: PathBuf,
    /// Substring identifying the production branch among remote references.
    pub production_branch: String,
    /// Extra environment variables passed to every task of this kind.
    pub env: Vec<EnvVar>,
}

impl Default for ArtifactRootConfig {
    fn default() -> Self {
        Self {
            installation_folder: PathBuf::from("work"),
            production_branch: "production".to_string(),
            env: Vec::new(),
        }
    }
}

/// A single `name = value` environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// The external task runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRunnerConfig {
    pub program: String,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self {
            program: "robot".to_string(),
        }
    }
}

/// An app installed when the workspace first launches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundledApp {
    pub external_id: i64,
    pub name: String,
    pub path: String,
    pub repo_url: String,
    pub topics: Vec<String>,
}

impl BundledApp {
    /// Install request for this app.
    pub fn to_request(&self) -> UsageRequest {
        UsageRequest::new(ArtifactKind::App, self.external_id, self.name.clone())
            .with_path(self.path.clone())
            .with_repo_url(self.repo_url.clone())
            .with_topics(self.topics.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// The engine itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub version: String,
    /// Directory holding the engine binary, supervisor scripts, `wui/` and
    /// `update/`. Defaults to the directory of the running executable.
    pub install_path: Option<PathBuf>,
}

/// A separately versioned component (guard process, UI bundle).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    pub version: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote Services
// ─────────────────────────────────────────────────────────────────────────────

/// A remote HTTP service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
}

/// Identity provider used to broker third-party tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub url_base: String,
    pub realm: String,
}

/// Internal package index used for `ok/<project>` package sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageRepoConfig {
    pub protocol: String,
    pub token_name: String,
    pub token_value: String,
    pub url_base: String,
}

impl Default for PackageRepoConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            token_name: String::new(),
            token_value: String::new(),
            url_base: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Update and Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Self-update loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15 * 60,
        }
    }
}

/// Log file settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Defaults to `<volume>/logs`.
    pub dir: Option<PathBuf>,
}
