//! Live configuration with dotted-key updates.
//!
//! The store keeps both the raw TOML table and the typed view. Updates are
//! applied to the raw table so keys outside the typed schema survive; the
//! result is reparsed, written to disk, and only then swapped in.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::discovery::write_config_text;
use crate::{ConfigError, Result, WorkspaceConfig};

struct State {
    raw: toml::Table,
    config: WorkspaceConfig,
}

/// Shared, mutable workspace configuration.
pub struct ConfigStore {
    path: Option<PathBuf>,
    state: RwLock<State>,
}

impl ConfigStore {
    /// Load the store from a config file.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: toml::Table = toml::from_str(&contents)?;
        let config = parse_table(&raw)?;
        debug!(path = %path.display(), "Loaded workspace config");

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: RwLock::new(State { raw, config }),
        })
    }

    /// Create a store that is never written to disk.
    pub fn in_memory(config: WorkspaceConfig) -> Result<Self> {
        let raw = match toml::Value::try_from(&config)? {
            toml::Value::Table(table) => table,
            _ => toml::Table::new(),
        };
        Ok(Self {
            path: None,
            state: RwLock::new(State { raw, config }),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current configuration.
    pub fn snapshot(&self) -> WorkspaceConfig {
        self.state.read().config.clone()
    }

    /// Read a value through a projection without cloning the whole config.
    pub fn read<T>(&self, f: impl FnOnce(&WorkspaceConfig) -> T) -> T {
        f(&self.state.read().config)
    }

    /// Set `key` (e.g. `engine.version`) to `value` and persist the document.
    ///
    /// Missing intermediate tables are created. Setting a key whose parent is
    /// a non-table value, or a value that no longer parses as a valid
    /// configuration, is rejected and leaves the store unchanged.
    pub fn set_value(&self, key: &str, value: impl Into<toml::Value>) -> Result<()> {
        let value = value.into();
        let mut state = self.state.write();

        let mut raw = state.raw.clone();
        set_dotted(&mut raw, key, value)?;
        let config = parse_table(&raw)?;

        if let Some(path) = &self.path {
            let text = toml::to_string_pretty(&raw)?;
            write_config_text(path, &text)?;
        }

        info!(key, "Updated workspace config");
        state.raw = raw;
        state.config = config;
        Ok(())
    }

    /// Re-read the backing file, discarding in-memory state.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let fresh = Self::open(path)?;
        *self.state.write() = fresh.state.into_inner();
        Ok(())
    }
}

fn parse_table(raw: &toml::Table) -> Result<WorkspaceConfig> {
    Ok(toml::Value::Table(raw.clone()).try_into()?)
}

fn set_dotted(table: &mut toml::Table, key: &str, value: toml::Value) -> Result<()> {
    let invalid = |reason: &str| ConfigError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid("empty segment"));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| invalid("empty key"))?;

    let mut current = table;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        current = match entry {
            toml::Value::Table(t) => t,
            _ => return Err(invalid(&format!("'{segment}' is not a table"))),
        };
    }

    current.insert(last.to_string(), value);
    Ok(())
}
