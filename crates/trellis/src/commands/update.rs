//! Update command - one self-update pass.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;
use serde_json::json;

use trellis_engine::TokioProcessRunner;
use trellis_update::{HttpUpdateService, UpdateManager};

use super::Context;

/// Arguments for the update command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(subcommand)]
    pub command: UpdateCommand,
}

#[derive(Subcommand, Debug)]
pub enum UpdateCommand {
    /// Check for updates and apply every offered component
    Check,

    /// Show the installed component versions
    Versions,
}

/// Run the update command.
pub async fn run(args: UpdateArgs, ctx: &Context) -> Result<()> {
    match args.command {
        UpdateCommand::Check => cmd_check(ctx).await,
        UpdateCommand::Versions => cmd_versions(ctx),
    }
}

fn manager(ctx: &Context) -> Result<UpdateManager> {
    let config = ctx.open_config()?;
    let endpoint = config.read(|c| c.workspace_service.endpoint.clone());
    Ok(UpdateManager::new(
        config,
        Arc::new(HttpUpdateService::new(endpoint)),
        Arc::new(TokioProcessRunner),
    ))
}

async fn cmd_check(ctx: &Context) -> Result<()> {
    let summary = manager(ctx)?.check_and_update().await?;

    if ctx.json_output {
        let applied: Vec<_> = summary.applied.iter().map(|c| c.as_str()).collect();
        let failed: Vec<_> = summary
            .failed
            .iter()
            .map(|(c, e)| json!({ "component": c.as_str(), "error": e.to_string() }))
            .collect();
        let out = json!({ "applied": applied, "failed": failed });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if summary.is_empty() {
        println!("Up to date.");
    } else {
        for component in &summary.applied {
            println!("  {} {}", style("updated").green(), component);
        }
        for (component, error) in &summary.failed {
            println!("  {} {}: {}", style("failed").red(), component, error);
        }
    }

    if !summary.failed.is_empty() {
        anyhow::bail!("{} component(s) failed to update", summary.failed.len());
    }
    Ok(())
}

fn cmd_versions(ctx: &Context) -> Result<()> {
    let report = manager(ctx)?.version_report();
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let show = |v: &str| if v.is_empty() { "-".to_string() } else { v.to_string() };
    println!("engine  {}", show(&report.engine_version));
    println!("guard   {}", show(&report.guard_version));
    println!("ui      {}", show(&report.ui_version));
    Ok(())
}
