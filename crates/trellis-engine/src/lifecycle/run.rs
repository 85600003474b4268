//! One task-runner invocation.
//!
//! Files produced per run, all named with the same `<yyyymmdd_hhmmss>`
//! suffix:
//!
//! ```text
//! <artifact>/variables_<suffix>.yml  ──► <installRoot>/logs/
//! <artifact>/log_<suffix>.html       ──► <installRoot>/logs/
//! <artifact>/report_<suffix>.html    ──► <installRoot>/logs/
//! <artifact>/variables.json            removed (workflows only)
//! <artifact>/output.xml                removed
//! <artifact>/output.json               parsed, returned, removed
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use trellis_config::WorkspaceConfig;
use trellis_types::{Artifact, ArtifactKind, Caller, Operation, Parameter, TOKEN_PARAMETER, UsageRequest};

use super::LifecycleController;
use crate::error::{EngineError, Result};
use crate::process::ProcessSpec;

/// Token alias resolved to the caller's personal access token.
pub const ACCESS_TOKEN_ALIAS: &str = "access_token";
/// Token alias resolved to the caller's raw bearer token.
pub const BEARER_TOKEN_ALIAS: &str = "bearer_token";
/// Variable carrying the caller's username alongside resolved tokens.
pub const ENV_USERNAME: &str = "username";

const ENV_PLATFORM_DOMAIN: &str = "platform_domain";
const ENV_WORKSPACE_ID: &str = "workspace_id";
const VAR_APPS_FOLDER: &str = "apps_folder";

const SUFFIX_FORMAT: &str = "%Y%m%d_%H%M%S";
const WORKFLOW_ENTRY: &str = "task.robot";
const VARIABLES_JSON: &str = "variables.json";
const OUTPUT_XML: &str = "output.xml";
const OUTPUT_JSON: &str = "output.json";

/// Names of the files one run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunFiles {
    pub suffix: String,
    pub variables: String,
    pub log: String,
    pub report: String,
}

impl RunFiles {
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            variables: format!("variables_{suffix}.yml"),
            log: format!("log_{suffix}.html"),
            report: format!("report_{suffix}.html"),
        }
    }
}

/// What came out of a finished (or unstartable) task run.
#[derive(Debug)]
pub(crate) struct TaskRun {
    pub report_url: String,
    /// Exit code, or why the runner could not be started.
    pub exit: std::result::Result<Option<i32>, String>,
    pub output: Option<serde_json::Value>,
}

impl TaskRun {
    /// The failure this run represents, if any.
    pub fn failure(&self, kind: ArtifactKind, operation: Operation) -> Option<EngineError> {
        match &self.exit {
            Ok(Some(0)) => None,
            Ok(Some(exit_code)) => Some(EngineError::TaskFailed {
                kind,
                operation,
                exit_code: *exit_code,
                report_url: self.report_url.clone(),
            }),
            Ok(None) => Some(EngineError::TaskSpawn {
                kind,
                operation,
                message: "terminated by a signal".into(),
                report_url: self.report_url.clone(),
            }),
            Err(message) => Some(EngineError::TaskSpawn {
                kind,
                operation,
                message: message.clone(),
                report_url: self.report_url.clone(),
            }),
        }
    }
}

impl LifecycleController {
    /// Run the task for `operation` inside the artifact directory.
    ///
    /// Errors are limited to failures before the runner starts; the run's
    /// own outcome is carried by [`TaskRun`].
    pub(crate) async fn run_task(
        &self,
        artifact: &Artifact,
        request: &UsageRequest,
        caller: &Caller,
        operation: Operation,
    ) -> Result<TaskRun> {
        let config = self.ctx.config.snapshot();
        let kind = artifact.kind;
        let task_dir = config.artifact_dir(kind, &artifact.path);
        let files = RunFiles::new(&self.ctx.clock.now().format(SUFFIX_FORMAT).to_string());

        let env = self.build_env(request, caller, kind, &config).await?;
        let mut spec = ProcessSpec::new(&config.task_runner.program)
            .current_dir(&task_dir)
            .envs(env);

        let vars = variables(&request.parameters, &config);
        match write_variables(&task_dir, &files, &vars, kind) {
            Ok(path) => spec = spec.arg("-V").arg(path.display().to_string()),
            Err(e) => warn!(error = %e, "Failed to write variables file, running without it"),
        }

        let entry = match kind {
            ArtifactKind::Workflow => WORKFLOW_ENTRY.to_string(),
            ArtifactKind::App => format!("{}.robot", operation),
        };
        spec = spec
            .arg("-l")
            .arg(task_dir.join(&files.log).display().to_string())
            .arg("-r")
            .arg(task_dir.join(&files.report).display().to_string())
            .arg(task_dir.join(entry).display().to_string());

        info!(
            %kind,
            external_id = artifact.external_id,
            %operation,
            suffix = %files.suffix,
            "Running task"
        );
        let exit = match self.runner.run(&spec).await {
            Ok(output) => {
                debug!(exit_code = ?output.exit_code, "Task finished");
                Ok(output.exit_code)
            }
            Err(e) => {
                warn!(program = %spec.program, error = %e, "Failed to start task runner");
                Err(e.to_string())
            }
        };

        relocate_run_files(&task_dir, &config.logs_dir(kind), &files);
        let output = take_output_payload(&task_dir);

        Ok(TaskRun {
            report_url: report_url(&config, kind, &files),
            exit,
            output,
        })
    }

    /// Environment passed to the task runner on top of the inherited one.
    pub(crate) async fn build_env(
        &self,
        request: &UsageRequest,
        caller: &Caller,
        kind: ArtifactKind,
        config: &WorkspaceConfig,
    ) -> Result<Vec<(String, String)>> {
        let mut env = vec![
            (ENV_PLATFORM_DOMAIN.to_string(), config.platform_domain.clone()),
            (ENV_WORKSPACE_ID.to_string(), config.workspace.id.clone()),
        ];

        if let Some(token) = request.parameter(TOKEN_PARAMETER)
            && !token.actual_values.is_empty()
        {
            for alias in &token.actual_values {
                let value = match alias.as_str() {
                    ACCESS_TOKEN_ALIAS => caller.personal_token.clone(),
                    BEARER_TOKEN_ALIAS => caller.bearer_token.clone(),
                    other => self
                        .ctx
                        .tokens
                        .idp_token(&caller.bearer_token, other)
                        .await
                        .map_err(|source| EngineError::Token {
                            alias: other.to_string(),
                            source,
                        })?,
                };
                env.push((alias.clone(), value));
            }
            env.push((ENV_USERNAME.to_string(), caller.username.clone()));
        }

        env.extend(
            config
                .artifact_root(kind)
                .env
                .iter()
                .map(|v| (v.name.clone(), v.value.clone())),
        );
        Ok(env)
    }
}

/// Variables handed to the task: every parameter except the token list,
/// joined with `", "`, plus the workspace basics.
fn variables(parameters: &[Parameter], config: &WorkspaceConfig) -> BTreeMap<String, String> {
    let mut vars: BTreeMap<String, String> = parameters
        .iter()
        .filter(|p| !p.is_token())
        .map(|p| (p.name.clone(), p.joined_values()))
        .collect();
    vars.insert(ENV_PLATFORM_DOMAIN.into(), config.platform_domain.clone());
    vars.insert(
        VAR_APPS_FOLDER.into(),
        config.app.installation_folder.display().to_string(),
    );
    vars.insert(ENV_WORKSPACE_ID.into(), config.workspace.id.clone());
    vars
}

fn write_variables(
    task_dir: &Path,
    files: &RunFiles,
    vars: &BTreeMap<String, String>,
    kind: ArtifactKind,
) -> std::io::Result<PathBuf> {
    let path = task_dir.join(&files.variables);
    let yaml = serde_yaml::to_string(vars).map_err(std::io::Error::other)?;
    std::fs::write(&path, yaml)?;

    if kind == ArtifactKind::Workflow {
        let json = serde_json::to_string_pretty(vars)?;
        std::fs::write(task_dir.join(VARIABLES_JSON), json)?;
    }
    Ok(path)
}

fn report_url(config: &WorkspaceConfig, kind: ArtifactKind, files: &RunFiles) -> String {
    let domain = if config.workspace.domain.is_empty() {
        &config.platform_domain
    } else {
        &config.workspace.domain
    };
    let segment = match kind {
        ArtifactKind::Workflow => "tasklogs",
        ArtifactKind::App => "applogs",
    };
    format!("https://{}/{}/{}", domain, segment, files.report)
}

/// Move log, report and variables dump to the shared logs directory and
/// drop the runner's scratch files.
fn relocate_run_files(task_dir: &Path, logs_dir: &Path, files: &RunFiles) {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        warn!(dir = %logs_dir.display(), error = %e, "Failed to create logs directory");
        return;
    }
    for name in [&files.log, &files.report, &files.variables] {
        let from = task_dir.join(name);
        if !from.exists() {
            debug!(file = %name, "Run file not produced");
            continue;
        }
        if let Err(e) = move_file(&from, &logs_dir.join(name)) {
            warn!(file = %name, error = %e, "Failed to relocate run file");
        }
    }
    for name in [VARIABLES_JSON, OUTPUT_XML] {
        let path = task_dir.join(name);
        if path.exists()
            && let Err(e) = std::fs::remove_file(&path)
        {
            warn!(file = name, error = %e, "Failed to remove scratch file");
        }
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Parse and remove `output.json`, if the task wrote one.
fn take_output_payload(task_dir: &Path) -> Option<serde_json::Value> {
    let path = task_dir.join(OUTPUT_JSON);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(error = %e, "Failed to read task output");
            return None;
        }
    };
    if let Err(e) = std::fs::remove_file(&path) {
        warn!(error = %e, "Failed to remove task output");
    }
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Task output is not valid JSON");
            None
        }
    }
}
