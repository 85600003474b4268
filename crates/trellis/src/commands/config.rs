//! Config command - inspect and edit `workspace.toml`.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use trellis_config::WorkspaceConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Set a dotted key, e.g. `engine.version 1.5.0`
    Set {
        /// Dotted key
        key: String,

        /// New value; `true`/`false` and integers are typed
        value: String,
    },

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Set { key, value } => cmd_set(&key, &value, ctx),
        ConfigCommand::Init { force } => cmd_init(force, ctx),
        ConfigCommand::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let (config, loaded) = if ctx.config_path.exists() {
        (trellis_config::load_config_file(&ctx.config_path)?, true)
    } else {
        (WorkspaceConfig::default(), false)
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if loaded {
        println!("# {}\n", style(ctx.config_path.display()).bold());
    } else {
        println!(
            "# {} not found (using defaults)\n",
            style(ctx.config_path.display()).bold()
        );
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_set(key: &str, value: &str, ctx: &Context) -> Result<()> {
    let config = ctx.open_config()?;
    config.set_value(key, parse_value(value))?;
    if ctx.verbose {
        println!("{} = {}", key, value);
    }
    Ok(())
}

fn cmd_init(force: bool, ctx: &Context) -> Result<()> {
    if ctx.config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            ctx.config_path.display()
        );
    }
    trellis_config::save_config(&WorkspaceConfig::default(), &ctx.config_path)?;
    println!("Wrote {}", ctx.config_path.display());
    Ok(())
}

/// Type a command-line value: booleans and integers keep their type, the
/// rest is stored as a string.
fn parse_value(raw: &str) -> toml::Value {
    match raw {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        _ => match raw.parse::<i64>() {
            Ok(n) => toml::Value::Integer(n),
            Err(_) => toml::Value::String(raw.to_string()),
        },
    }
}
