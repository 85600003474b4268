//! Artifact record store.
//!
//! The lifecycle controller treats persistence as a record store with
//! create/find/save/delete semantics over four record families: artifacts,
//! their parameters, and workflow schedules. [`ArtifactStore`] is that seam;
//! [`SqliteArtifactStore`] is the embedded single-file implementation and
//! [`MockArtifactStore`] an in-memory double for tests.

pub mod error;
pub mod sqlite;
pub mod storage;

pub use error::{Result, StoreError};
pub use sqlite::SqliteArtifactStore;
pub use storage::{ArtifactStore, MockArtifactStore};
