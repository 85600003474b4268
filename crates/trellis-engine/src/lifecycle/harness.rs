//! Shared fixtures for lifecycle tests.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::TimeZone;
use tempfile::TempDir;
use trellis_config::{ConfigStore, EnvVar, WorkspaceConfig};
use trellis_store::MockArtifactStore;
use trellis_types::{ArtifactKind, Caller, Parameter, UsageRequest};

use super::LifecycleController;
use crate::clock::FixedClock;
use crate::context::EngineContext;
use crate::process::{ProcessOutput, ProcessSpec, ScriptedRunner};
use crate::repo::FakeRepoClient;
use crate::tokens::StaticTokenProvider;

pub const WORKSPACE_ID: &str = "3f1c8a52-5f8e-4bd0-9a43-0d6c2a1b7e90";
pub const DOMAIN: &str = "ws-1.example.io";
/// Run suffix produced by the harness clock.
pub const SUFFIX: &str = "20240102_030405";

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MockArtifactStore>,
    pub repo: Arc<FakeRepoClient>,
    pub runner: Arc<ScriptedRunner>,
    pub config: Arc<ConfigStore>,
    pub controller: LifecycleController,
}

fn default_repo() -> FakeRepoClient {
    FakeRepoClient::new()
        .with_file("task.robot", "*** Tasks ***")
        .with_file("start.robot", "*** Tasks ***")
        .with_file("stop.robot", "*** Tasks ***")
        .with_file("uninstall.robot", "*** Tasks ***")
}

impl Harness {
    pub fn new() -> Self {
        Self::build(default_repo(), ScriptedRunner::new(), |_| {})
    }

    pub fn with_repo(repo: FakeRepoClient) -> Self {
        Self::build(repo, ScriptedRunner::new(), |_| {})
    }

    pub fn with_runner(runner: ScriptedRunner) -> Self {
        Self::build(default_repo(), runner, |_| {})
    }

    pub fn with_workspace_id(id: &str) -> Self {
        Self::build(default_repo(), ScriptedRunner::new(), |c| c.workspace.id = id.into())
    }

    /// Harness whose configuration is adjusted after the defaults are set.
    pub fn configured(runner: ScriptedRunner, adjust: impl FnOnce(&mut WorkspaceConfig)) -> Self {
        Self::build(default_repo(), runner, adjust)
    }

    fn build(
        repo: FakeRepoClient,
        runner: ScriptedRunner,
        adjust: impl FnOnce(&mut WorkspaceConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = WorkspaceConfig::default();
        config.platform_domain = "platform.example.io".into();
        config.workspace.id = WORKSPACE_ID.into();
        config.workspace.domain = DOMAIN.into();
        config.workflow.installation_folder = dir.path().join("workflows");
        config.app.installation_folder = dir.path().join("apps");
        config.workflow.env = vec![EnvVar {
            name: "HTTP_PROXY".into(),
            value: "http://proxy:3128".into(),
        }];
        config.engine.install_path = Some(dir.path().join("engine"));
        adjust(&mut config);

        let config = Arc::new(ConfigStore::in_memory(config).unwrap());
        let store = Arc::new(MockArtifactStore::new());
        let repo = Arc::new(repo);
        let runner = Arc::new(runner);
        let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let tokens = StaticTokenProvider::new().with_token("github", "gho_brokered");

        let ctx = EngineContext::new(config.clone(), store.clone(), Arc::new(tokens))
            .with_clock(Arc::new(clock));
        let controller = LifecycleController::new(ctx, repo.clone(), runner.clone());

        Self {
            dir,
            store,
            repo,
            runner,
            config,
            controller,
        }
    }

    pub fn workflow_dir(&self, path: &str) -> PathBuf {
        self.dir.path().join("workflows").join(path)
    }

    pub fn app_dir(&self, path: &str) -> PathBuf {
        self.dir.path().join("apps").join(path)
    }
}

pub fn caller() -> Caller {
    Caller::new("caller-jwt", "glpat-personal", "jane")
}

/// External id 42, path `acme/demo`, a workspace task with one parameter.
pub fn workflow_request() -> UsageRequest {
    UsageRequest::new(ArtifactKind::Workflow, 42, "demo")
        .with_path("acme/demo")
        .with_repo_url("https://git.example.io/acme/demo.git")
        .with_topics(["type=task", "target=workspace"])
        .with_parameter(Parameter::with_values("ok_prompt", vec!["hello".into()]))
}

pub fn app_request() -> UsageRequest {
    UsageRequest::new(ArtifactKind::App, 7, "notebook")
        .with_path("apps/notebook")
        .with_repo_url("https://git.example.io/apps/notebook.git")
        .with_topics(["type=app", "target=workspace"])
}

/// Runner answering every task run with `exit_code` after writing the files
/// the task runner would produce.
pub fn task_runner(exit_code: i32, output_json: Option<&'static str>) -> ScriptedRunner {
    ScriptedRunner::with_handler(move |spec: &ProcessSpec| {
        if spec.program == "robot" {
            if let Some(dir) = &spec.work_dir {
                for flag in ["-l", "-r"] {
                    if let Some(i) = spec.args.iter().position(|a| a == flag) {
                        std::fs::write(&spec.args[i + 1], "<html/>")?;
                    }
                }
                std::fs::write(dir.join("output.xml"), "<robot/>")?;
                if let Some(json) = output_json {
                    std::fs::write(dir.join("output.json"), json)?;
                }
            }
            return Ok(ProcessOutput::exited(exit_code));
        }
        Ok(ProcessOutput::exited(0))
    })
}
