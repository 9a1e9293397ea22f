// CLI - Command Line Interface for the KratOs execution layer
// Principle: Simple, clear, composable commands

pub mod config;
pub mod runner;

use crate::types::{AccountId, TxKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// KratOs execution layer - executes consensus-ordered batches
#[derive(Parser, Debug)]
#[command(name = "kratos-exec")]
#[command(author = "KratOs Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "KratOs execution layer - turns consensus ordering into blocks")]
#[command(long_about = r#"
The execution layer streams candidate transactions to an external consensus
layer and commits the batches it finalizes.

Run a development node against a local consensus service:
  kratos-exec run --consensus-url http://127.0.0.1:9080

Use a custom chain spec:
  kratos-exec chain-spec --output my-chain.json
  kratos-exec run --chain my-chain.json
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "KRATOS_EXEC_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the execution node
    Run(RunCmd),

    /// Write the built-in development chain spec as JSON
    ChainSpec(ChainSpecCmd),

    /// Purge chain data
    Purge(PurgeCmd),
}

/// Run the node
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Base path for chain data
    #[arg(short = 'd', long, env = "KRATOS_EXEC_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Chain specification (dev or path to spec file)
    #[arg(long, default_value = "dev", env = "KRATOS_EXEC_CHAIN")]
    pub chain: String,

    /// RPC listen port (CommitBlock, VerifyTx, local submission)
    #[arg(long, default_value = "9877", env = "KRATOS_EXEC_RPC_PORT")]
    pub rpc_port: u16,

    /// RPC listen address (use 0.0.0.0 for public)
    #[arg(long, default_value = "127.0.0.1", env = "KRATOS_EXEC_RPC_ADDR")]
    pub rpc_addr: String,

    /// Base URL of the consensus layer
    #[arg(long, default_value = "http://127.0.0.1:9080", env = "KRATOS_EXEC_CONSENSUS_URL")]
    pub consensus_url: String,

    /// Interval between candidate rounds, in milliseconds (minimum 1000)
    #[arg(long, default_value = "1000", env = "KRATOS_EXEC_RECOMMIT_MS")]
    pub recommit_ms: u64,

    /// Block gas limit the chain is steered towards
    #[arg(long, default_value = "30000000", env = "KRATOS_EXEC_GAS_CEIL")]
    pub gas_ceil: u64,

    /// Minimum tip per gas for remote transactions
    #[arg(long, default_value = "1000000", env = "KRATOS_EXEC_MIN_TIP")]
    pub min_tip: u128,

    /// Block reward recipient (hex). Defaults to the dev account on the dev chain.
    #[arg(long, env = "KRATOS_EXEC_COINBASE")]
    pub coinbase: Option<AccountId>,

    /// Accepted transaction kinds (legacy, access-list, dynamic-fee)
    #[arg(long, value_delimiter = ',', default_value = "legacy,access-list,dynamic-fee")]
    pub accept: Vec<TxKind>,

    /// Maximum encoded transaction size in bytes
    #[arg(long, default_value = "131072")]
    pub max_tx_size: usize,

    /// Maximum number of pooled transactions
    #[arg(long, default_value = "10000")]
    pub pool_size: usize,
}

/// Write the development chain spec
#[derive(Parser, Debug)]
pub struct ChainSpecCmd {
    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Purge chain data
#[derive(Parser, Debug)]
pub struct PurgeCmd {
    /// Base path for chain data
    #[arg(short = 'd', long)]
    pub base_path: Option<PathBuf>,

    /// Chain to purge (chain name)
    #[arg(long, default_value = "dev")]
    pub chain: String,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Platform data directory for a chain
fn default_base_path(chain: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kratos-exec")
        .join("chains")
        .join(chain)
}

impl RunCmd {
    /// Get the base path, defaulting to platform-specific data directory
    pub fn get_base_path(&self) -> PathBuf {
        match self.base_path {
            Some(ref path) => path.clone(),
            None => default_base_path(&self.chain),
        }
    }
}

impl PurgeCmd {
    /// Get the base path for the chain to purge
    pub fn get_base_path(&self) -> PathBuf {
        match self.base_path {
            Some(ref path) => path.clone(),
            None => default_base_path(&self.chain),
        }
    }
}
