//! Execute, schedule and app operations.

use tracing::{info, warn};
use trellis_types::{
    Artifact, ArtifactKind, Caller, Operation, Parameter, Schedule, Status, UsageRequest, new_id,
};

use super::outcome::OperationOutcome;
use super::{LifecycleController, classify, ensure_authenticated};
use crate::error::{EngineError, Result};

const WORKFLOW_EXECUTED: &str = "Successfully executed the task.";
const WORKFLOW_SCHEDULED: &str = "Successfully scheduled the task.";

impl LifecycleController {
    /// Install the workflow if needed, run `task.robot` and record the result.
    pub async fn execute_workflow(&self, request: UsageRequest, caller: &Caller) -> OperationOutcome {
        self.run_operation(request, caller, Operation::Execute).await
    }

    /// Install the workflow if needed and store its schedule.
    ///
    /// The schedule is upserted by `(workflow, name)`; the workflow itself is
    /// not run.
    pub async fn schedule_workflow(&self, mut request: UsageRequest, caller: &Caller) -> OperationOutcome {
        match self.schedule(&mut request, caller).await {
            Ok(()) => OperationOutcome::completed(WORKFLOW_SCHEDULED),
            Err(e) => {
                warn!(external_id = request.external_id, error = %e, "Scheduling failed");
                OperationOutcome::failed(e)
            }
        }
    }

    /// Run the app task matching `operation` (`install.robot`,
    /// `start.robot`, ...), installing the app first when needed.
    pub async fn handle_app(
        &self,
        request: UsageRequest,
        caller: &Caller,
        operation: Operation,
    ) -> OperationOutcome {
        match operation {
            Operation::Uninstall => self.uninstall_app(request.external_id, caller).await,
            Operation::Schedule => OperationOutcome::failed(EngineError::InvalidRequest {
                kind: ArtifactKind::App,
                reason: "apps cannot be scheduled".into(),
            }),
            _ => self.run_operation(request, caller, operation).await,
        }
    }

    /// Run `uninstall.robot` for an installed app and drop its record.
    ///
    /// Only apps of the `installed` type can be removed. The record is
    /// deleted once the task succeeds; a failed run keeps it with the
    /// failure status.
    pub async fn uninstall_app(&self, external_id: i64, caller: &Caller) -> OperationOutcome {
        let kind = ArtifactKind::App;
        let artifact = match self.uninstall_target(external_id, caller) {
            Ok(artifact) => artifact,
            Err(e) => return OperationOutcome::failed(e),
        };
        let parameters = match self.ctx.store.list_parameters(&artifact.id) {
            Ok(parameters) => parameters,
            Err(e) => return OperationOutcome::failed(e.into()),
        };

        let mut request = UsageRequest::new(kind, external_id, artifact.name.clone())
            .with_path(artifact.path.clone())
            .with_repo_url(artifact.repo_url.clone())
            .with_topics(artifact.topics.clone());
        request.artifact_type = artifact.artifact_type.clone();
        request.parameters = parameters;

        self.run_installed(artifact, request, caller, Operation::Uninstall)
            .await
    }

    fn uninstall_target(&self, external_id: i64, caller: &Caller) -> Result<Artifact> {
        let kind = ArtifactKind::App;
        ensure_authenticated(caller)?;
        self.ctx.workspace_id()?;

        let artifact = self
            .ctx
            .store
            .find_artifact(kind, external_id)?
            .ok_or(EngineError::NotFound { kind, external_id })?;
        if !artifact.is_installed_type() {
            return Err(EngineError::InvalidRequest {
                kind,
                reason: format!("app type '{}' cannot be uninstalled", artifact.artifact_type),
            });
        }
        Ok(artifact)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────

    async fn run_operation(
        &self,
        mut request: UsageRequest,
        caller: &Caller,
        operation: Operation,
    ) -> OperationOutcome {
        let artifact = match self.check_install_if_needed(&mut request, caller).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(
                    kind = %request.kind,
                    external_id = request.external_id,
                    error = %e,
                    "Install check failed"
                );
                return OperationOutcome::failed(e);
            }
        };
        self.run_installed(artifact, request, caller, operation)
            .await
    }

    /// Classify, run and persist for an artifact known to be installed.
    async fn run_installed(
        &self,
        mut artifact: Artifact,
        request: UsageRequest,
        caller: &Caller,
        operation: Operation,
    ) -> OperationOutcome {
        let kind = artifact.kind;
        if let Err(e) = classify(kind, &request.topics) {
            warn!(%kind, external_id = artifact.external_id, error = %e, "Unsupported artifact");
            return OperationOutcome::failed(e);
        }

        if kind == ArtifactKind::App
            && operation == Operation::Install
            && !self.has_entry_point(&artifact, operation)
        {
            info!(external_id = artifact.external_id, "No install task, app is ready");
            return OperationOutcome::completed(app_message(operation));
        }

        let run = match self.run_task(&artifact, &request, caller, operation).await {
            Ok(run) => run,
            Err(e) => {
                warn!(%kind, external_id = artifact.external_id, error = %e, "Task could not be prepared");
                if let Err(save) = self.persist(&mut artifact, operation.failure_status(), operation) {
                    warn!(error = %save, "Failed to record failure status");
                }
                return OperationOutcome::failed(e);
            }
        };

        let failure = run.failure(kind, operation);
        let status = if failure.is_some() {
            operation.failure_status()
        } else {
            operation.target_status()
        };
        let saved = self.persist(&mut artifact, status, operation);
        if saved.is_ok() && status != Status::Uninstalled {
            self.update_parameters(&artifact, &request.parameters);
        }

        let outcome = match failure {
            Some(error) => {
                warn!(
                    %kind,
                    external_id = artifact.external_id,
                    %operation,
                    exit_code = ?error.exit_code(),
                    "Task failed"
                );
                OperationOutcome::failed(error)
            }
            None => {
                info!(%kind, external_id = artifact.external_id, %operation, "Task completed");
                let message = match kind {
                    ArtifactKind::Workflow => WORKFLOW_EXECUTED.to_string(),
                    ArtifactKind::App => app_message(operation),
                };
                OperationOutcome::completed(message).with_report(Some(run.report_url))
            }
        }
        .with_output(run.output);

        match saved {
            Ok(()) => outcome,
            Err(e) => outcome.with_error(Some(e)),
        }
    }

    async fn schedule(&self, request: &mut UsageRequest, caller: &Caller) -> Result<()> {
        let kind = ArtifactKind::Workflow;
        ensure_authenticated(caller)?;
        let Some(schedule) = request.schedule.clone() else {
            return Err(EngineError::InvalidRequest {
                kind,
                reason: "schedule is required".into(),
            });
        };

        // One schedule per workflow: it is keyed and named after the workflow.
        let mut artifact = self.check_install_if_needed(request, caller).await?;
        let schedule = Schedule {
            id: None,
            workflow_id: artifact.id.clone(),
            name: artifact.name.clone(),
            timestamp: self.ctx.clock.now(),
            ..schedule
        };
        match self.ctx.store.upsert_schedule(&schedule) {
            Ok(0) => return Err(EngineError::Schedule("no rows affected".into())),
            Ok(_) => {}
            Err(e) => return Err(EngineError::Schedule(e.to_string())),
        }
        info!(
            external_id = artifact.external_id,
            schedule = %schedule.name,
            start = schedule.start,
            end = schedule.end,
            "Schedule stored"
        );

        self.persist(&mut artifact, Status::ToBeScheduled, Operation::Schedule)?;
        self.update_parameters(&artifact, &request.parameters);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────

    /// Record `status` on the artifact. A successful app uninstall deletes
    /// the record instead.
    fn persist(&self, artifact: &mut Artifact, status: Status, operation: Operation) -> Result<()> {
        let kind = artifact.kind;
        artifact.status = status;
        artifact.timestamp = self.ctx.clock.now();
        let save_failed = |reason: String| EngineError::SaveFailed { kind, reason };

        let rows = if kind == ArtifactKind::App
            && operation == Operation::Uninstall
            && status == Status::Uninstalled
        {
            self.ctx
                .store
                .delete_artifact(kind, artifact.external_id)
                .map_err(|e| save_failed(e.to_string()))?
        } else {
            self.ctx
                .store
                .save_artifact(artifact)
                .map_err(|e| save_failed(e.to_string()))?
        };
        if rows == 0 {
            return Err(save_failed("no rows affected".into()));
        }
        info!(%kind, external_id = artifact.external_id, status = artifact.status_code(), "Status recorded");
        Ok(())
    }

    /// Store the supplied values: parameters are matched by name, unknown
    /// ones are created.
    fn update_parameters(&self, artifact: &Artifact, parameters: &[Parameter]) {
        if parameters.is_empty() {
            return;
        }
        let stored = match self.ctx.store.list_parameters(&artifact.id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load parameters");
                return;
            }
        };

        for param in parameters {
            let result = match stored.iter().find(|s| s.name == param.name) {
                Some(existing) => {
                    let updated = Parameter {
                        actual_values: param.actual_values.clone(),
                        ..existing.clone()
                    };
                    self.ctx.store.update_parameter(&artifact.id, &updated)
                }
                None => {
                    let created = Parameter {
                        id: Some(new_id()),
                        ..param.clone()
                    };
                    self.ctx.store.create_parameter(&artifact.id, &created)
                }
            };
            if let Err(e) = result {
                warn!(parameter = %param.name, error = %e, "Failed to store parameter");
            }
        }
    }

    fn has_entry_point(&self, artifact: &Artifact, operation: Operation) -> bool {
        self.ctx
            .config
            .read(|c| c.artifact_dir(artifact.kind, &artifact.path))
            .join(format!("{operation}.robot"))
            .exists()
    }
}

fn app_message(operation: Operation) -> String {
    format!("Successfully completed the command {operation} for the app.")
}
