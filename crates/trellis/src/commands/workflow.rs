//! Workflow command - execute, schedule and inspect workflows.

use anyhow::Result;
use clap::{Args, Subcommand};

use trellis_types::{ArtifactKind, Schedule};

use super::{ArtifactArgs, CallerArgs, Context, print_artifacts, print_response};

/// Arguments for the workflow command.
#[derive(Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Install the workflow if needed and run it
    Execute {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Install the workflow if needed and store its schedule
    Schedule {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Show recently run workflows
    History {
        /// Maximum number of workflows to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Run when the workspace starts
    #[arg(long)]
    pub start: bool,

    /// Run when the workspace shuts down
    #[arg(long)]
    pub end: bool,

    /// Cron expression
    #[arg(long, default_value = "")]
    pub cron: String,

    /// Time zone of the cron expression
    #[arg(long, default_value = "UTC")]
    pub time_zone: String,
}

impl ScheduleArgs {
    fn into_schedule(self) -> Schedule {
        Schedule {
            id: None,
            workflow_id: String::new(),
            name: String::new(),
            start: self.start,
            end: self.end,
            cron_expression: self.cron,
            time_zone: self.time_zone,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Run the workflow command.
pub async fn run(args: WorkflowArgs, ctx: &Context) -> Result<()> {
    match args.command {
        WorkflowCommand::Execute { artifact, caller } => cmd_execute(artifact, caller, ctx).await,
        WorkflowCommand::Schedule {
            artifact,
            schedule,
            caller,
        } => cmd_schedule(artifact, schedule, caller, ctx).await,
        WorkflowCommand::History { limit } => cmd_history(limit, ctx),
    }
}

async fn cmd_execute(artifact: ArtifactArgs, caller: CallerArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let mut request = artifact.into_request(ArtifactKind::Workflow);
    if let Err(e) = engine.controller.bind_parameter_ids(&mut request) {
        return print_response(&e.response(), ctx.json_output);
    }

    let outcome = engine
        .controller
        .execute_workflow(request, &caller.caller())
        .await;
    print_response(&outcome.response(), ctx.json_output)
}

async fn cmd_schedule(
    artifact: ArtifactArgs,
    schedule: ScheduleArgs,
    caller: CallerArgs,
    ctx: &Context,
) -> Result<()> {
    let engine = ctx.engine()?;
    let mut request = artifact
        .into_request(ArtifactKind::Workflow)
        .with_schedule(schedule.into_schedule());
    if let Err(e) = engine.controller.bind_parameter_ids(&mut request) {
        return print_response(&e.response(), ctx.json_output);
    }

    let outcome = engine
        .controller
        .schedule_workflow(request, &caller.caller())
        .await;
    print_response(&outcome.response(), ctx.json_output)
}

fn cmd_history(limit: usize, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let history = engine.controller.workflow_history(limit)?;
    print_artifacts(&history, ctx.json_output)
}
