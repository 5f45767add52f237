//! Command-line entry point for toolhub.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hub_config::ConfigStore;
use hub_kernel::{Orchestrator, ProcessSource};
use hub_telemetry::{HealthStatus, init_tracing};
use serde_json::Value;

/// Load capability packages and call their tools under policy.
#[derive(Debug, Parser)]
#[command(name = "toolhub", version, about)]
struct Cli {
    /// Configuration file. Defaults to `$TOOLHUB_CONFIG`, then
    /// `~/.config/toolhub/config.yaml`.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print package load state and policy summary.
    Status,
    /// Print the health view as JSON. Exits non-zero when unhealthy.
    Health,
    /// List exposed tools as JSON.
    Tools,
    /// Invoke one tool.
    Call {
        /// Qualified tool name, e.g. `sheets_list_sheets`.
        name: String,
        /// JSON object of arguments.
        #[arg(long, value_name = "JSON", default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let store = match cli.config {
        Some(path) => ConfigStore::load_or_empty(path),
        None => ConfigStore::load_default(),
    };
    let hub = Orchestrator::initialize(store, Arc::new(ProcessSource::new())).await;

    match cli.command {
        Command::Status => {
            print!("{}", hub.status_text());
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let view = hub.health().await;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(if view.status == HealthStatus::Unhealthy {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&hub.tools())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { name, args } => {
            let args: Value =
                serde_json::from_str(&args).context("--args must be a JSON document")?;
            let output = hub.call(&name, args).await;
            println!("{}", output.as_text());
            Ok(if output.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
