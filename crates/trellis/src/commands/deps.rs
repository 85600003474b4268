//! Deps command - resolve a dependency manifest against the host.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;
use serde_json::json;

use trellis_config::PackageRepoConfig;
use trellis_engine::{DependencyResolver, PackageOutcome, TokioProcessRunner};

use super::Context;

/// Arguments for the deps command.
#[derive(Args, Debug)]
pub struct DepsArgs {
    #[command(subcommand)]
    pub command: DepsCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepsCommand {
    /// Probe every declared package and install the missing ones
    Check {
        /// Path to the manifest (conda.yaml)
        manifest: PathBuf,
    },
}

/// Run the deps command.
pub async fn run(args: DepsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        DepsCommand::Check { manifest } => cmd_check(&manifest, ctx).await,
    }
}

async fn cmd_check(manifest: &std::path::Path, ctx: &Context) -> Result<()> {
    // The package index is optional; without a config file only public
    // sources resolve.
    let repo = trellis_config::load_config_file(&ctx.config_path)
        .map(|c| c.package_repo)
        .unwrap_or_else(|_| PackageRepoConfig::default());

    let resolver = DependencyResolver::new(Arc::new(TokioProcessRunner));
    let report = resolver.resolve(manifest, &repo).await?;

    if ctx.json_output {
        let packages: Vec<_> = report
            .packages
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "manager": p.manager,
                    "outcome": outcome_label(&p.outcome),
                    "detail": outcome_detail(&p.outcome),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    if report.packages.is_empty() {
        println!("No dependencies declared.");
        return Ok(());
    }
    for p in &report.packages {
        let label = outcome_label(&p.outcome);
        let label = if p.outcome.is_soft_failure() {
            style(label).yellow()
        } else {
            style(label).green()
        };
        match outcome_detail(&p.outcome) {
            Some(detail) => println!("  {:<24} {:<6} {} ({})", p.name, p.manager, label, detail),
            None => println!("  {:<24} {:<6} {}", p.name, p.manager, label),
        }
    }
    println!();
    println!(
        "{} installed, {} already present, {} unresolved",
        report.installed(),
        report.already_installed(),
        report.soft_failures()
    );
    Ok(())
}

fn outcome_label(outcome: &PackageOutcome) -> &'static str {
    match outcome {
        PackageOutcome::AlreadyInstalled => "present",
        PackageOutcome::Installed => "installed",
        PackageOutcome::Unsupported(_) => "unsupported",
        PackageOutcome::ProbeFailed(_) => "probe failed",
        PackageOutcome::InstallFailed(_) => "install failed",
    }
}

fn outcome_detail(outcome: &PackageOutcome) -> Option<&str> {
    match outcome {
        PackageOutcome::Unsupported(d)
        | PackageOutcome::ProbeFailed(d)
        | PackageOutcome::InstallFailed(d) => Some(d),
        _ => None,
    }
}
