//! Filesystem layout derived from configuration.
//!
//! ```text
//! <installRoot>/<artifactPath>/   cloned artifact trees
//! <installRoot>/logs/             relocated run logs, reports, variables
//! <enginePath>/update/<kind>/     unpacked self-update payloads
//! <enginePath>/wui/               live UI bundle
//! ```

use std::path::{Path, PathBuf};

use trellis_types::ArtifactKind;

use crate::{ConfigError, Result, WorkspaceConfig};

/// Directory under each install root receiving run artifacts.
pub const LOGS_DIR: &str = "logs";
/// Directory under the engine path receiving update payloads.
pub const UPDATE_DIR: &str = "update";
/// Directory under the engine path holding the live UI bundle.
pub const UI_DIR: &str = "wui";

impl WorkspaceConfig {
    /// Install root for artifacts of `kind`.
    pub fn install_root(&self, kind: ArtifactKind) -> &Path {
        &self.artifact_root(kind).installation_folder
    }

    /// Working directory of a single artifact.
    pub fn artifact_dir(&self, kind: ArtifactKind, artifact_path: &str) -> PathBuf {
        self.install_root(kind).join(artifact_path)
    }

    /// Shared logs directory for artifacts of `kind`.
    pub fn logs_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.install_root(kind).join(LOGS_DIR)
    }

    /// Engine installation directory.
    ///
    /// Resolution order:
    /// 1. Configured `engine.install_path`
    /// 2. Directory of the running executable
    /// 3. Current directory
    pub fn engine_path(&self) -> PathBuf {
        if let Some(path) = &self.engine.install_path {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Staging directory for an update payload of `component`.
    pub fn update_staging_dir(&self, component: &str) -> PathBuf {
        self.engine_path().join(UPDATE_DIR).join(component)
    }

    /// Live UI bundle directory.
    pub fn ui_dir(&self) -> PathBuf {
        self.engine_path().join(UI_DIR)
    }

    /// Create every directory the configuration refers to.
    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = [
            self.database.path.clone(),
            self.workflow.installation_folder.clone(),
            self.logs_dir(ArtifactKind::Workflow),
            self.app.installation_folder.clone(),
            self.logs_dir(ArtifactKind::App),
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_layout() {
        let mut config = WorkspaceConfig::default();
        config.workflow.installation_folder = PathBuf::from("/work/workflows");
        config.app.installation_folder = PathBuf::from("/work/apps");

        assert_eq!(
            config.artifact_dir(ArtifactKind::Workflow, "acme/demo"),
            PathBuf::from("/work/workflows/acme/demo")
        );
        assert_eq!(
            config.logs_dir(ArtifactKind::App),
            PathBuf::from("/work/apps/logs")
        );
    }

    #[test]
    fn test_engine_layout_uses_configured_path() {
        let mut config = WorkspaceConfig::default();
        config.engine.install_path = Some(PathBuf::from("/opt/trellis"));

        assert_eq!(
            config.update_staging_dir("ui"),
            PathBuf::from("/opt/trellis/update/ui")
        );
        assert_eq!(config.ui_dir(), PathBuf::from("/opt/trellis/wui"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let mut config = WorkspaceConfig::default();
        config.database.path = dir.path().join("db");
        config.workflow.installation_folder = dir.path().join("workflows");
        config.app.installation_folder = dir.path().join("apps");

        config.ensure_directories().unwrap();
        assert!(dir.path().join("db").is_dir());
        assert!(dir.path().join("workflows/logs").is_dir());
        assert!(dir.path().join("apps/logs").is_dir());
    }
}
