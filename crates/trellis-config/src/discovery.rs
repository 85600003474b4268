//! Config file discovery, loading and saving.
//!
//! Resolution order for `workspace.toml`:
//! 1. An explicit path (CLI `--config`)
//! 2. `$TRELLIS_VOLUME_PATH/workspace.toml`
//! 3. `./workspace.toml`

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, WorkspaceConfig};

/// Default config filename.
pub const CONFIG_FILE: &str = "workspace.toml";

/// Environment variable naming the workspace volume directory.
pub const VOLUME_ENV: &str = "TRELLIS_VOLUME_PATH";

/// Resolve the config file path.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    volume_dir().join(CONFIG_FILE)
}

/// Directory holding the workspace volume (config, logs, database).
///
/// Checks `TRELLIS_VOLUME_PATH` first, then falls back to the current
/// directory.
pub fn volume_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(VOLUME_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Application name for platform directory resolution.
const APP_NAME: &str = "trellis";

/// Default directory for rolling log files when `logging.dir` is unset.
///
/// Uses the platform state directory, then the local data directory, then
/// `./logs`.
pub fn default_log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join(APP_NAME).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Load config from a specific file path.
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    WorkspaceConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &WorkspaceConfig, path: &Path) -> Result<()> {
    let contents = config.to_toml()?;
    write_config_text(path, &contents)
}

pub(crate) fn write_config_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}
