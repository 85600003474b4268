//! Trellis - workspace engine for workflows and apps
//!
//! Main entry point for the Trellis CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{app, config, deps, run, update, workflow};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Trellis - workspace engine for workflows and apps
#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to workspace.toml (default: $TRELLIS_VOLUME_PATH/workspace.toml)
    #[arg(long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute, schedule and inspect workflows
    Workflow(workflow::WorkflowArgs),

    /// Install and drive apps
    App(app::AppArgs),

    /// Check and install declared host packages
    Deps(deps::DepsArgs),

    /// Check for and apply engine, guard and UI updates
    Update(update::UpdateArgs),

    /// Workspace configuration
    Config(config::ConfigArgs),

    /// Provision the workspace and keep the update loop running
    Run(run::RunArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = trellis_config::config_path(cli.config.as_deref());

    // Console (human-readable) + daily JSON file
    let filter = if cli.verbose {
        "trellis=debug,trellis_engine=debug,trellis_update=debug,trellis_config=debug,trellis_store=debug,info"
    } else {
        "trellis=info,trellis_engine=info,trellis_update=info,warn"
    };

    let log_dir = trellis_config::load_config_file(&config_path)
        .ok()
        .and_then(|c| c.logging.dir)
        .unwrap_or_else(trellis_config::default_log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "trellis.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "trellis=trace,trellis_engine=trace,trellis_update=trace,trellis_config=trace,trellis_store=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Workflow(args) => workflow::run(args, &ctx).await,
        Commands::App(args) => app::run(args, &ctx).await,
        Commands::Deps(args) => deps::run(args, &ctx).await,
        Commands::Update(args) => update::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
    }
}
