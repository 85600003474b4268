//! Lifecycle controller for workflows and apps.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! check_install_if_needed ── clone + checkout + record (first use only)
//!         │                  dependency resolution (every call)
//!         ▼
//! classify topics ────────── type/target tags, no persistence on failure
//!         ▼
//! run task ───────────────── variables file, env, runner, relocate logs
//!         ▼
//! persist status ─────────── save (or delete on app uninstall), parameters
//! ```
//!
//! Failures after the task ran still persist the failure status before
//! being surfaced.

mod install;
mod operations;
mod outcome;
mod queries;
mod run;
mod startup;

#[cfg(test)]
mod harness;

use std::sync::Arc;

use trellis_types::{ArtifactKind, Caller};

use crate::context::EngineContext;
use crate::deps::DependencyResolver;
use crate::error::{EngineError, Result};
use crate::process::ProcessRunner;
use crate::repo::RepoClient;

pub use outcome::OperationOutcome;
pub use run::{ACCESS_TOKEN_ALIAS, BEARER_TOKEN_ALIAS, ENV_USERNAME};
pub use startup::StartupSummary;

/// Topic value every supported artifact must target.
pub const WORKSPACE_TARGET: &str = "workspace";

/// Drives artifacts through install, run and status persistence.
pub struct LifecycleController {
    ctx: EngineContext,
    repo: Arc<dyn RepoClient>,
    runner: Arc<dyn ProcessRunner>,
    resolver: DependencyResolver,
}

impl LifecycleController {
    pub fn new(
        ctx: EngineContext,
        repo: Arc<dyn RepoClient>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let resolver = DependencyResolver::new(runner.clone());
        Self {
            ctx,
            repo,
            runner,
            resolver,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }
}

/// Types accepted in the `type=` topic for each kind.
fn supported_types(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        ArtifactKind::Workflow => &["task", "prompt"],
        ArtifactKind::App => &["app"],
    }
}

/// Check the classification topics of an artifact.
fn classify(kind: ArtifactKind, topics: &[String]) -> Result<()> {
    let artifact_type =
        trellis_types::topic_value(topics, "type").ok_or(EngineError::TypeMissing { kind })?;
    let target =
        trellis_types::topic_value(topics, "target").ok_or(EngineError::TargetMissing { kind })?;

    if !supported_types(kind).contains(&artifact_type) {
        return Err(EngineError::UnsupportedType {
            kind,
            value: artifact_type.to_string(),
        });
    }
    if target != WORKSPACE_TARGET {
        return Err(EngineError::UnsupportedTarget {
            kind,
            value: target.to_string(),
        });
    }
    Ok(())
}

fn ensure_authenticated(caller: &Caller) -> Result<()> {
    if caller.bearer_token.trim().is_empty() {
        return Err(EngineError::Unauthenticated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_accepts_supported_topics() {
        classify(
            ArtifactKind::Workflow,
            &topics(&["type=task", "target=workspace"]),
        )
        .unwrap();
        classify(
            ArtifactKind::Workflow,
            &topics(&["type=prompt", "target = workspace"]),
        )
        .unwrap();
        classify(ArtifactKind::App, &topics(&["type=app", "target=workspace"])).unwrap();
    }

    #[test]
    fn test_classify_missing_tags() {
        let err = classify(ArtifactKind::Workflow, &topics(&["target=workspace"])).unwrap_err();
        assert!(matches!(err, EngineError::TypeMissing { .. }));

        let err = classify(ArtifactKind::Workflow, &topics(&["type=task", "misc"])).unwrap_err();
        assert!(matches!(err, EngineError::TargetMissing { .. }));
    }

    #[test]
    fn test_classify_unsupported_values() {
        let err = classify(ArtifactKind::App, &topics(&["type=task", "target=workspace"]))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedType { value, .. } if value == "task"));

        let err = classify(
            ArtifactKind::Workflow,
            &topics(&["type=task", "target=cluster"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTarget { value, .. } if value == "cluster"));
    }

    #[test]
    fn test_empty_bearer_is_unauthenticated() {
        assert!(ensure_authenticated(&Caller::default()).is_err());
        assert!(ensure_authenticated(&Caller::new("jwt", "", "")).is_ok());
    }
}
