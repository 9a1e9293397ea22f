// KratOs Execution Layer - Entry point
// Principle: Consensus decides the order, execution decides the state

#![allow(dead_code)]

mod cli;
mod consensus;
mod execution;
mod genesis;
mod node;
mod rpc;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::NodeConfig;
use cli::runner::run_node;
use cli::{Cli, Commands};
use genesis::ChainSpec;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    // Execute command
    match cli.command {
        Commands::Run(cmd) => {
            print_banner();

            // Build node configuration from CLI args
            let config = NodeConfig::from_run_cmd(&cmd).map_err(|e| {
                error!("Configuration error: {}", e);
                anyhow::anyhow!("Configuration error: {}", e)
            })?;

            // Run the node
            if let Err(e) = run_node(config).await {
                error!("Node error: {}", e);
                return Err(anyhow::anyhow!("Node error: {}", e));
            }
        }

        Commands::ChainSpec(cmd) => {
            let spec = ChainSpec::dev();
            match cmd.output {
                Some(path) => {
                    spec.to_file(&path.to_string_lossy())?;
                    info!("Chain spec written to: {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&spec)?),
            }
        }

        Commands::Purge(cmd) => {
            let path = cmd.get_base_path();

            if !cmd.yes {
                println!("This will delete all chain data at: {}", path.display());
                println!("Are you sure? [y/N]");

                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            if path.exists() {
                std::fs::remove_dir_all(&path)?;
                info!("Purged chain data at: {}", path.display());
            } else {
                info!("No data to purge at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Print the KratOs banner
fn print_banner() {
    println!(r#"
    ╔═══════════════════════════════════════════════════════════╗
    ║                                                           ║
    ║   ██╗  ██╗██████╗  █████╗ ████████╗ ██████╗ ███████╗     ║
    ║   ██║ ██╔╝██╔══██╗██╔══██╗╚══██╔══╝██╔═══██╗██╔════╝     ║
    ║   █████╔╝ ██████╔╝███████║   ██║   ██║   ██║███████╗     ║
    ║   ██╔═██╗ ██╔══██╗██╔══██║   ██║   ██║   ██║╚════██║     ║
    ║   ██║  ██╗██║  ██║██║  ██║   ██║   ╚██████╔╝███████║     ║
    ║   ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝    ╚═════╝ ╚══════╝     ║
    ║                                                           ║
    ║                      Execution Layer                      ║
    ║           Consensus orders, the executor commits          ║
    ║                                                           ║
    ╚═══════════════════════════════════════════════════════════╝
    "#);
    println!("    Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}
