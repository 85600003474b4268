//! Workspace configuration for the Trellis engine.
//!
//! Provides a TOML-based `workspace.toml` with:
//! - Install roots and production branches per artifact kind
//! - Component versions for the engine, guard and UI bundle
//! - Endpoints for the workspace service and identity provider
//! - A [`ConfigStore`] that applies dotted-key updates and persists them

pub mod discovery;
pub mod error;
pub mod paths;
pub mod store;
pub mod types;

pub use discovery::{config_path, default_log_dir, load_config_file, save_config, volume_dir};
pub use error::{ConfigError, Result};
pub use store::ConfigStore;
pub use types::*;
