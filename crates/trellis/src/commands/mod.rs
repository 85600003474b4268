//! CLI command handlers.

pub mod app;
pub mod config;
pub mod deps;
pub mod run;
pub mod update;
pub mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::json;

use trellis_config::ConfigStore;
use trellis_engine::{
    EngineContext, GitCli, HttpTokenProvider, LifecycleController, ProcessRunner,
    TokioProcessRunner,
};
use trellis_store::{ArtifactStore, SqliteArtifactStore};
use trellis_types::{Artifact, ArtifactKind, Caller, Parameter, ResponseBody, UsageRequest};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved path of `workspace.toml`.
    pub config_path: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Wired engine components.
pub struct Engine {
    pub config: Arc<ConfigStore>,
    pub runner: Arc<dyn ProcessRunner>,
    pub controller: LifecycleController,
}

impl Context {
    pub fn open_config(&self) -> Result<Arc<ConfigStore>> {
        let store = ConfigStore::open(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
        Ok(Arc::new(store))
    }

    /// Open config and record store and build the lifecycle controller.
    pub fn engine(&self) -> Result<Engine> {
        let config = self.open_config()?;
        let db_path = config.read(|c| c.database.file_path());
        let store: Arc<dyn ArtifactStore> = Arc::new(
            SqliteArtifactStore::open(&db_path)
                .with_context(|| format!("Failed to open database {}", db_path.display()))?,
        );

        let tokens = Arc::new(HttpTokenProvider::new(config.clone()));
        let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);
        let engine_ctx = EngineContext::new(config.clone(), store, tokens);
        let controller = LifecycleController::new(engine_ctx, Arc::new(GitCli), runner.clone());

        Ok(Engine {
            config,
            runner,
            controller,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials of the caller.
#[derive(Args, Clone)]
pub struct CallerArgs {
    /// Authorization header value (`Bearer <token>`)
    #[arg(long, env = "TRELLIS_AUTHORIZATION", hide_env_values = true)]
    pub authorization: Option<String>,

    /// Personal access token for repository access
    #[arg(long, env = "TRELLIS_PERSONAL_TOKEN", hide_env_values = true)]
    pub personal_token: Option<String>,

    /// Username paired with the personal access token
    #[arg(long, env = "TRELLIS_USERNAME")]
    pub username: Option<String>,
}

impl CallerArgs {
    /// Caller built from the arguments. A missing or malformed authorization
    /// leaves the bearer empty, which operations reject as unauthenticated.
    pub fn caller(&self) -> Caller {
        let bearer = self
            .authorization
            .as_deref()
            .and_then(Caller::bearer_from_header)
            .unwrap_or_default();
        Caller::new(
            bearer,
            self.personal_token.clone().unwrap_or_default(),
            self.username.clone().unwrap_or_default(),
        )
    }
}

impl std::fmt::Debug for CallerArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerArgs")
            .field("authorization", &self.authorization.as_ref().map(|_| "***"))
            .field("personal_token", &self.personal_token.as_ref().map(|_| "***"))
            .field("username", &self.username)
            .finish()
    }
}

/// Reference to a workflow or app and the values supplied for it.
#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Source-control project id
    pub id: i64,

    /// Display name
    #[arg(long, default_value = "")]
    pub name: String,

    /// Repository path, relative to the install root
    #[arg(long, default_value = "")]
    pub path: String,

    /// Clone URL
    #[arg(long, default_value = "")]
    pub repo_url: String,

    /// Classification topic, e.g. `type=task` (repeatable)
    #[arg(long = "topic")]
    pub topics: Vec<String>,

    /// Artifact type recorded on install
    #[arg(long = "type", default_value = "")]
    pub artifact_type: String,

    /// Parameter as `name=value[,value...]` (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<Parameter>,
}

impl ArtifactArgs {
    pub fn into_request(self, kind: ArtifactKind) -> UsageRequest {
        let mut request = UsageRequest::new(kind, self.id, self.name)
            .with_path(self.path)
            .with_repo_url(self.repo_url)
            .with_topics(self.topics);
        request.artifact_type = self.artifact_type;
        request.parameters = self.params;
        request
    }
}

/// Parse `name=v1,v2` into a parameter.
pub fn parse_param(s: &str) -> std::result::Result<Parameter, String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("parameter name is empty".to_string());
    }
    let values = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    Ok(Parameter::with_values(name, values))
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Print a response body; a non-OK code fails the command.
pub fn print_response(body: &ResponseBody, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(body)?);
    } else {
        println!("{}: {}", body.code, body.message);
        if let Some(output) = &body.output {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
    }
    if !body.is_ok() {
        anyhow::bail!("operation failed with {}", body.code);
    }
    Ok(())
}

pub fn artifact_json(artifact: &Artifact) -> serde_json::Value {
    json!({
        "id": artifact.id,
        "externalId": artifact.external_id,
        "name": artifact.name,
        "status": artifact.status_code(),
        "path": artifact.path,
        "type": artifact.artifact_type,
        "timestamp": artifact.timestamp.to_rfc3339(),
    })
}

/// Print artifacts as a table, or a JSON array.
pub fn print_artifacts(artifacts: &[Artifact], json_output: bool) -> Result<()> {
    if json_output {
        let list: Vec<_> = artifacts.iter().map(artifact_json).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    if artifacts.is_empty() {
        println!("Nothing recorded yet.");
        return Ok(());
    }
    for a in artifacts {
        println!(
            "{:<8} {:<24} {:<28} {}",
            a.external_id,
            a.name,
            a.status_code(),
            a.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_list() {
        let param = parse_param("regions=eu, us").unwrap();
        assert_eq!(param.name, "regions");
        assert_eq!(param.actual_values, ["eu", "us"]);
        assert!(param.id.is_none());
    }

    #[test]
    fn test_parse_param_rejects_missing_separator() {
        assert!(parse_param("regions").is_err());
        assert!(parse_param("=eu").is_err());
    }

    #[test]
    fn test_caller_from_header() {
        let args = CallerArgs {
            authorization: Some("Bearer abc".into()),
            personal_token: None,
            username: Some("jane".into()),
        };
        let caller = args.caller();
        assert_eq!(caller.bearer_token, "abc");
        assert_eq!(caller.username, "jane");

        let malformed = CallerArgs {
            authorization: Some("Basic abc".into()),
            personal_token: None,
            username: None,
        };
        assert!(malformed.caller().bearer_token.is_empty());
    }
}
