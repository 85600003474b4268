//! Run command - launch the workspace and keep the update loop alive.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use trellis_update::{HttpUpdateService, UpdateManager};

use super::{CallerArgs, Context};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Skip the periodic self-update loop
    #[arg(long)]
    pub no_update: bool,

    #[command(flatten)]
    pub caller: CallerArgs,
}

/// Provision the workspace, then wait for Ctrl+C.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    engine.config.read(|c| c.ensure_directories())?;

    let summary = engine.controller.launch(&args.caller.caller()).await?;
    info!(
        bundled_installed = summary.bundled_installed,
        bundled_failed = summary.bundled_failed,
        executed = summary.executed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Workspace launched"
    );
    if !ctx.json_output {
        println!(
            "Workspace ready: {} bundled app(s) installed, {} startup workflow(s) run",
            summary.bundled_installed, summary.executed
        );
    }

    let cancel = CancellationToken::new();
    let updates = if args.no_update {
        None
    } else {
        let endpoint = engine
            .config
            .read(|c| c.workspace_service.endpoint.clone());
        let manager = Arc::new(UpdateManager::new(
            engine.config.clone(),
            Arc::new(HttpUpdateService::new(endpoint)),
            engine.runner.clone(),
        ));
        Some(manager.spawn_periodic(cancel.clone()))
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();
    if let Some(handle) = updates {
        handle.await?;
    }
    Ok(())
}
