//! Artifact lifecycle engine.
//!
//! The [`LifecycleController`] drives workflows and apps through install,
//! dependency resolution, task execution and status persistence. Every
//! external effect goes through a narrow capability trait so tests can swap
//! in doubles:
//!
//! ```text
//! LifecycleController
//!     ├── EngineContext      - config, record store, clock, token provider
//!     ├── RepoClient         - clone, list references, checkout
//!     ├── ProcessRunner      - task runner and package manager commands
//!     └── DependencyResolver - probe/install plans per package manager
//! ```

pub mod clock;
pub mod context;
pub mod deps;
pub mod error;
pub mod lifecycle;
pub mod process;
pub mod repo;
pub mod tokens;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::EngineContext;
pub use deps::{DependencyError, DependencyResolver, Manifest, PackageOutcome, ResolveReport};
pub use error::{EngineError, Result};
pub use lifecycle::{LifecycleController, OperationOutcome, StartupSummary};
pub use process::{ProcessOutput, ProcessRunner, ProcessSpec, ScriptedRunner, TokioProcessRunner};
pub use repo::{FakeRepoClient, GitCli, RepoClient, RepoCredentials, RepoError, RepoHandle};
pub use tokens::{HttpTokenProvider, StaticTokenProvider, TokenError, TokenProvider};
