//! Install-if-needed and install.

use std::collections::HashSet;
use std::path::{Component, Path};

use tracing::{debug, info, warn};
use trellis_types::{Artifact, Caller, INSTALLED_TYPE, Parameter, Status, UsageRequest, new_id};

use super::{LifecycleController, ensure_authenticated};
use crate::deps::MANIFEST_FILE;
use crate::error::{EngineError, Result};
use crate::repo::{RepoCredentials, RepoError, RepoHandle, find_reference};

impl LifecycleController {
    /// Make sure the requested artifact is installed and its dependencies
    /// are present.
    ///
    /// A missing record triggers an install and a record left in the
    /// failed-install status is installed again. For a healthy record the
    /// stored path, URL, type and topics overwrite whatever the request
    /// carried, and every supplied parameter must reference a stored
    /// parameter id.
    pub async fn check_install_if_needed(
        &self,
        request: &mut UsageRequest,
        caller: &Caller,
    ) -> Result<Artifact> {
        ensure_authenticated(caller)?;
        self.ctx.workspace_id()?;

        let kind = request.kind;
        let existing = self.ctx.store.find_artifact(kind, request.external_id)?;
        let artifact = match existing {
            None => {
                info!(%kind, external_id = request.external_id, "Artifact not installed, installing");
                self.install_record(request, caller, None).await?
            }
            Some(existing) if existing.status == Status::FailedToInstall => {
                info!(%kind, external_id = request.external_id, "Retrying failed install");
                adopt_record(request, &existing);
                self.install_record(request, caller, Some(existing)).await?
            }
            Some(existing) => {
                adopt_record(request, &existing);
                self.validate_parameters(&existing, request)?;
                existing
            }
        };

        self.resolve_dependencies(&artifact).await;
        Ok(artifact)
    }

    /// Clone the artifact, check out its production branch and create the
    /// record in the installed status.
    pub async fn install(&self, request: &UsageRequest, caller: &Caller) -> Result<Artifact> {
        ensure_authenticated(caller)?;
        self.ctx.workspace_id()?;
        self.install_record(request, caller, None).await
    }

    /// Fill in stored parameter ids for request parameters that only carry
    /// a name.
    pub fn bind_parameter_ids(&self, request: &mut UsageRequest) -> Result<()> {
        let Some(artifact) = self
            .ctx
            .store
            .find_artifact(request.kind, request.external_id)?
        else {
            return Ok(());
        };
        let stored = self.ctx.store.list_parameters(&artifact.id)?;
        for param in request.parameters.iter_mut().filter(|p| p.id.is_none()) {
            param.id = stored
                .iter()
                .find(|s| s.name == param.name)
                .and_then(|s| s.id.clone());
        }
        Ok(())
    }

    async fn install_record(
        &self,
        request: &UsageRequest,
        caller: &Caller,
        existing: Option<Artifact>,
    ) -> Result<Artifact> {
        let kind = request.kind;
        validate_install_request(request)?;

        let (dest, branch) = self.ctx.config.read(|c| {
            (
                c.artifact_dir(kind, &request.path),
                c.artifact_root(kind).production_branch.clone(),
            )
        });
        let credentials = RepoCredentials::new(&caller.username, &caller.personal_token);
        let install_error = |source| EngineError::Install { kind, source };

        match self
            .repo
            .clone_repo(&request.repo_url, &dest, &credentials)
            .await
        {
            Ok(handle) => self
                .checkout_production(&handle, &branch)
                .await
                .map_err(install_error)?,
            Err(RepoError::AlreadyExists(_)) => {
                let handle = RepoHandle::new(&dest);
                if handle.has_metadata() {
                    info!(dest = %dest.display(), "Resuming interrupted install");
                    self.checkout_production(&handle, &branch)
                        .await
                        .map_err(install_error)?;
                } else {
                    info!(dest = %dest.display(), "Artifact tree already present, skipping clone");
                }
            }
            Err(e) => return Err(install_error(e)),
        }

        let workspace_id = self.ctx.workspace_id()?;
        let now = self.ctx.clock.now();
        let save_failed = |reason: String| EngineError::SaveFailed { kind, reason };

        let artifact = match existing {
            Some(mut artifact) => {
                artifact.status = Status::Installed;
                artifact.timestamp = now;
                artifact.workspace_id = workspace_id;
                let rows = self
                    .ctx
                    .store
                    .save_artifact(&artifact)
                    .map_err(|e| save_failed(e.to_string()))?;
                if rows == 0 {
                    return Err(save_failed("no rows affected".into()));
                }
                artifact
            }
            None => {
                let artifact = Artifact {
                    id: new_id(),
                    external_id: request.external_id,
                    kind,
                    name: request.name.clone(),
                    status: Status::Installed,
                    workspace_id,
                    timestamp: now,
                    path: request.path.clone(),
                    repo_url: request.repo_url.clone(),
                    artifact_type: if request.artifact_type.is_empty() {
                        INSTALLED_TYPE.to_string()
                    } else {
                        request.artifact_type.clone()
                    },
                    topics: request.topics.clone(),
                };
                let rows = self
                    .ctx
                    .store
                    .create_artifact(&artifact)
                    .map_err(|e| save_failed(e.to_string()))?;
                if rows == 0 {
                    return Err(save_failed("no rows affected".into()));
                }
                artifact
            }
        };

        self.store_new_parameters(&artifact, &request.parameters);
        info!(%kind, external_id = artifact.external_id, path = %artifact.path, "Artifact installed");
        Ok(artifact)
    }

    async fn checkout_production(
        &self,
        handle: &RepoHandle,
        branch: &str,
    ) -> std::result::Result<(), RepoError> {
        let references = self.repo.list_references(handle).await?;
        let reference = find_reference(&references, branch)
            .ok_or_else(|| RepoError::NoProductionBranch(branch.to_string()))?
            .to_string();
        self.repo.checkout(handle, &reference).await?;
        self.repo.strip_metadata(handle).await
    }

    /// Persist request parameters the artifact does not know yet.
    fn store_new_parameters(&self, artifact: &Artifact, parameters: &[Parameter]) {
        let stored = match self.ctx.store.list_parameters(&artifact.id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load parameters");
                return;
            }
        };
        for param in parameters {
            let known = stored
                .iter()
                .any(|s| s.name == param.name || (param.id.is_some() && s.id == param.id));
            if known {
                continue;
            }
            let mut param = param.clone();
            param.id = Some(new_id());
            if let Err(e) = self.ctx.store.create_parameter(&artifact.id, &param) {
                warn!(parameter = %param.name, error = %e, "Failed to store parameter");
            }
        }
    }

    fn validate_parameters(&self, artifact: &Artifact, request: &UsageRequest) -> Result<()> {
        if request.parameters.is_empty() {
            return Ok(());
        }
        let stored = self.ctx.store.list_parameters(&artifact.id)?;
        let known: HashSet<&str> = stored.iter().filter_map(|p| p.id.as_deref()).collect();

        for param in &request.parameters {
            match param.id.as_deref() {
                Some(id) if known.contains(id) => {}
                _ => {
                    return Err(EngineError::InvalidRequest {
                        kind: request.kind,
                        reason: format!("unknown parameter '{}'", param.name),
                    });
                }
            }
        }
        Ok(())
    }

    /// Probe and install declared host packages. Never fails the caller.
    pub(crate) async fn resolve_dependencies(&self, artifact: &Artifact) {
        let (manifest, repo) = self.ctx.config.read(|c| {
            (
                c.artifact_dir(artifact.kind, &artifact.path)
                    .join(MANIFEST_FILE),
                c.package_repo.clone(),
            )
        });

        match self.resolver.resolve(&manifest, &repo).await {
            Ok(report) if report.packages.is_empty() => {
                debug!(external_id = artifact.external_id, "No dependencies declared");
            }
            Ok(report) => info!(
                external_id = artifact.external_id,
                installed = report.installed(),
                already_installed = report.already_installed(),
                failed = report.soft_failures(),
                "Dependencies checked"
            ),
            Err(e) => warn!(external_id = artifact.external_id, error = %e, "Dependency check skipped"),
        }
    }
}

/// Copy the server-of-record fields onto a request.
fn adopt_record(request: &mut UsageRequest, record: &Artifact) {
    request.path = record.path.clone();
    request.repo_url = record.repo_url.clone();
    request.topics = record.topics.clone();
    request.artifact_type = record.artifact_type.clone();
    if request.name.is_empty() {
        request.name = record.name.clone();
    }
}

fn validate_install_request(request: &UsageRequest) -> Result<()> {
    let invalid = |reason: &str| EngineError::InvalidRequest {
        kind: request.kind,
        reason: reason.to_string(),
    };
    if request.path.trim().is_empty() {
        return Err(invalid("repository path is required"));
    }
    let confined = Path::new(&request.path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !confined {
        return Err(invalid("repository path must stay inside the install root"));
    }
    if request.repo_url.trim().is_empty() {
        return Err(invalid("repository URL is required"));
    }
    Ok(())
}
