//! Self-update for the engine, its guard process and the UI bundle.
//!
//! ```text
//! UpdateManager::check_and_update
//!   └── UpdateService::check_update ──► per component, UI → guard → engine:
//!         download    stream to a temp file, SHA-256, length check
//!         unpack      zip into <enginePath>/update/<component>/
//!         persist     <component>.version in workspace.toml
//!         apply       copy UI tree over wui/ | run the supervisor script
//! ```
//!
//! The engine and guard supervisor scripts swap the binary and stop the
//! running process; an external supervisor restarts it.

pub mod apply;
pub mod component;
pub mod download;
pub mod error;
pub mod manager;
pub mod service;
pub mod unpack;

pub use component::{AvailableUpdate, Component};
pub use download::{Download, download};
pub use error::{Result, UpdateError};
pub use manager::{UpdateManager, UpdateSummary};
pub use service::{
    HttpUpdateService, StaticUpdateService, UpdateCheck, UpdatePayload, UpdateService,
    VersionReport,
};
pub use unpack::unpack;
