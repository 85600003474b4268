//! Host package dependencies declared by an artifact.
//!
//! An artifact may ship a `workflow.yml` manifest listing the npm, apt and
//! pip packages it needs. Before every run each package is probed and
//! installed when absent. Failures are collected in a [`ResolveReport`]
//! instead of aborting the run; only an unreadable manifest is a hard error.

pub mod manifest;
pub mod plan;
pub mod resolver;

pub use manifest::{Dependency, MANIFEST_FILE, Manifest, Package, PackageSpec};
pub use plan::{PackageManager, PackagePlan, ProbeVerdict};
pub use resolver::{DependencyError, DependencyResolver, PackageOutcome, PackageReport, ResolveReport};
