//! App command - install, drive and remove apps.

use anyhow::Result;
use clap::{Args, Subcommand};

use trellis_types::{ArtifactKind, Operation};

use super::{ArtifactArgs, CallerArgs, Context, print_artifacts, print_response};

/// Arguments for the app command.
#[derive(Args, Debug)]
pub struct AppArgs {
    #[command(subcommand)]
    pub command: AppCommand,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Install an app and run its install task
    Install {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run the app's start task
    Start {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run the app's stop task
    Stop {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run the app's execute task
    Execute {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run the app's uninstall task and remove it
    Uninstall {
        /// Source-control project id
        id: i64,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// List installed apps
    List,
}

/// Run the app command.
pub async fn run(args: AppArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AppCommand::Install { artifact, caller } => {
            cmd_operation(artifact, caller, Operation::Install, ctx).await
        }
        AppCommand::Start { artifact, caller } => {
            cmd_operation(artifact, caller, Operation::Start, ctx).await
        }
        AppCommand::Stop { artifact, caller } => {
            cmd_operation(artifact, caller, Operation::Stop, ctx).await
        }
        AppCommand::Execute { artifact, caller } => {
            cmd_operation(artifact, caller, Operation::Execute, ctx).await
        }
        AppCommand::Uninstall { id, caller } => cmd_uninstall(id, caller, ctx).await,
        AppCommand::List => cmd_list(ctx),
    }
}

async fn cmd_operation(
    artifact: ArtifactArgs,
    caller: CallerArgs,
    operation: Operation,
    ctx: &Context,
) -> Result<()> {
    let engine = ctx.engine()?;
    let mut request = artifact.into_request(ArtifactKind::App);
    if let Err(e) = engine.controller.bind_parameter_ids(&mut request) {
        return print_response(&e.response(), ctx.json_output);
    }

    let outcome = engine
        .controller
        .handle_app(request, &caller.caller(), operation)
        .await;
    print_response(&outcome.response(), ctx.json_output)
}

async fn cmd_uninstall(id: i64, caller: CallerArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let outcome = engine.controller.uninstall_app(id, &caller.caller()).await;
    print_response(&outcome.response(), ctx.json_output)
}

fn cmd_list(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let apps = engine.controller.list_apps()?;
    print_artifacts(&apps, ctx.json_output)
}
