//! First-launch provisioning.
//!
//! `workspace.first_time_launched` moves through three values:
//!
//! | value | meaning |
//! |---|---|
//! | 0 | fresh workspace, bundled apps not installed yet |
//! | 1 | bundled apps installed, startup workflows pending |
//! | 2 | startup workflows ran, nothing left to do |

use tracing::{info, warn};
use trellis_config::{LAUNCH_COMPLETED, LAUNCH_PENDING, LAUNCH_SCHEDULED};
use trellis_types::{ArtifactKind, Caller, UsageRequest};

use super::LifecycleController;
use crate::error::Result;

const LAUNCH_MARKER_KEY: &str = "workspace.first_time_launched";

/// What a launch pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupSummary {
    pub bundled_installed: usize,
    pub bundled_failed: usize,
    pub executed: usize,
    pub failed: usize,
    /// Startup workflows already ran on an earlier launch.
    pub skipped: bool,
}

impl LifecycleController {
    /// Install bundled apps, then run startup workflows.
    pub async fn launch(&self, caller: &Caller) -> Result<StartupSummary> {
        let mut summary = self.install_bundled_apps(caller).await?;
        let tasks = self.run_startup_tasks(caller).await?;
        summary.executed = tasks.executed;
        summary.failed = tasks.failed;
        summary.skipped = tasks.skipped;
        Ok(summary)
    }

    /// Install every configured bundled app on a fresh workspace.
    ///
    /// Individual install failures are counted, not returned; the marker
    /// advances either way so a broken bundle does not block later launches.
    pub async fn install_bundled_apps(&self, caller: &Caller) -> Result<StartupSummary> {
        let mut summary = StartupSummary::default();
        let (marker, bundled) = self
            .ctx
            .config
            .read(|c| (c.workspace.first_time_launched, c.bundled_apps.clone()));
        if marker != LAUNCH_PENDING {
            return Ok(summary);
        }

        for app in &bundled {
            let mut request = app.to_request();
            match self.check_install_if_needed(&mut request, caller).await {
                Ok(_) => summary.bundled_installed += 1,
                Err(e) => {
                    warn!(external_id = app.external_id, name = %app.name, error = %e, "Bundled app install failed");
                    summary.bundled_failed += 1;
                }
            }
        }

        self.ctx
            .config
            .set_value(LAUNCH_MARKER_KEY, i64::from(LAUNCH_SCHEDULED))?;
        info!(
            installed = summary.bundled_installed,
            failed = summary.bundled_failed,
            "Bundled apps provisioned"
        );
        Ok(summary)
    }

    /// Execute every workflow whose schedule is flagged to run at start.
    ///
    /// Runs once per workspace: the launch marker is set to completed
    /// afterwards, also when no schedule qualifies.
    pub async fn run_startup_tasks(&self, caller: &Caller) -> Result<StartupSummary> {
        let mut summary = StartupSummary::default();
        if self.ctx.config.read(|c| c.workspace.first_time_launched) == LAUNCH_COMPLETED {
            summary.skipped = true;
            return Ok(summary);
        }

        for schedule in self.ctx.store.startup_schedules()? {
            let Some(artifact) = self.ctx.store.get_artifact(&schedule.workflow_id)? else {
                warn!(workflow_id = %schedule.workflow_id, "Startup schedule without workflow");
                summary.failed += 1;
                continue;
            };
            let mut request =
                UsageRequest::new(ArtifactKind::Workflow, artifact.external_id, artifact.name.clone())
                    .with_path(artifact.path.clone())
                    .with_repo_url(artifact.repo_url.clone())
                    .with_topics(artifact.topics.clone());
            request.parameters = self.ctx.store.list_parameters(&artifact.id)?;

            info!(external_id = artifact.external_id, schedule = %schedule.name, "Running startup workflow");
            let outcome = self.execute_workflow(request, caller).await;
            match &outcome.error {
                None => summary.executed += 1,
                Some(e) => {
                    warn!(external_id = artifact.external_id, error = %e, "Startup workflow failed");
                    summary.failed += 1;
                }
            }
        }

        self.ctx
            .config
            .set_value(LAUNCH_MARKER_KEY, i64::from(LAUNCH_COMPLETED))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::harness::{Harness, caller, task_runner, workflow_request};
    use trellis_config::BundledApp;
    use trellis_store::ArtifactStore;
    use trellis_types::Schedule;

    fn start_schedule() -> Schedule {
        Schedule {
            id: None,
            workflow_id: String::new(),
            name: "on-start".into(),
            start: true,
            end: false,
            cron_expression: String::new(),
            time_zone: String::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    fn marker(h: &Harness) -> u8 {
        h.config.read(|c| c.workspace.first_time_launched)
    }

    #[tokio::test]
    async fn test_startup_workflows_run_once() {
        let h = Harness::with_runner(task_runner(0, None));
        let request = workflow_request().with_schedule(start_schedule());
        assert!(h.controller.schedule_workflow(request, &caller()).await.is_success());

        let summary = h.controller.run_startup_tasks(&caller()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(h.runner.calls_to("robot").len(), 1);
        assert_eq!(marker(&h), LAUNCH_COMPLETED);

        let artifact = h.store.find_artifact(ArtifactKind::Workflow, 42).unwrap().unwrap();
        assert_eq!(artifact.status_code(), "WORKFLOW_EXECUTED");

        let again = h.controller.run_startup_tasks(&caller()).await.unwrap();
        assert!(again.skipped);
        assert_eq!(h.runner.calls_to("robot").len(), 1);
    }

    #[tokio::test]
    async fn test_no_startup_schedules_still_completes() {
        let h = Harness::new();
        let summary = h.controller.run_startup_tasks(&caller()).await.unwrap();
        assert_eq!(summary, StartupSummary::default());
        assert_eq!(marker(&h), LAUNCH_COMPLETED);
    }

    #[tokio::test]
    async fn test_bundled_apps_installed_on_fresh_workspace() {
        let h = Harness::configured(task_runner(0, None), |c| {
            c.bundled_apps = vec![BundledApp {
                external_id: 9,
                name: "files".into(),
                path: "bundled/files".into(),
                repo_url: "https://git.example.io/bundled/files.git".into(),
                topics: vec!["type=app".into(), "target=workspace".into()],
            }];
        });

        let summary = h.controller.launch(&caller()).await.unwrap();
        assert_eq!(summary.bundled_installed, 1);
        assert!(h.store.find_artifact(ArtifactKind::App, 9).unwrap().is_some());
        assert!(h.app_dir("bundled/files").join("start.robot").exists());
        assert_eq!(marker(&h), LAUNCH_COMPLETED);

        let second = h.controller.install_bundled_apps(&caller()).await.unwrap();
        assert_eq!(second.bundled_installed, 0);
        assert_eq!(h.repo.clones().len(), 1);
    }
}
