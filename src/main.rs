//! # Controller-Manager Operator
//!
//! ```bash
//! # Run the operator (default)
//! controller-manager-operator run
//!
//! # Print the configuration a sync pass would write, without writing it
//! controller-manager-operator render
//! ```
//!
//! Settings come from environment variables, see [`ControllerConfig::from_env`].

use anyhow::Result;
use clap::{Parser, Subcommand};
use controller_manager_operator::config::ControllerConfig;
use controller_manager_operator::runtime;

#[derive(Parser)]
#[command(name = "controller-manager-operator")]
#[command(about = "Keeps the controller-manager operand configured from cluster state")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the operator until SIGINT or SIGTERM
    Run,
    /// Observe and merge once, print the resulting YAML and exit
    Render,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ControllerConfig::from_env();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => runtime::run(config).await,
        Commands::Render => runtime::render_config(config).await,
    }
}
