// Runner - Main node execution logic
// Principle: Orchestrate node startup, RPC server, and graceful shutdown

use crate::cli::config::NodeConfig;
use crate::consensus::InstantFinality;
use crate::node::service::{Executor, NodeError};
use crate::rpc::{HttpConsensusLink, LinkError};
use crate::storage::{ChainDb, ChainError, ChainStore, Database, DatabaseError};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// Run the node with the given configuration
pub async fn run_node(config: NodeConfig) -> Result<(), RunnerError> {
    info!("🚀 Starting KratOs execution node");
    info!("📁 Data path: {}", config.base_path.display());
    info!("⛓️  Chain: {}", config.chain.name);

    // Ensure base path exists
    std::fs::create_dir_all(&config.base_path)
        .map_err(|e| RunnerError::Io(format!("Failed to create data dir: {}", e)))?;

    let db = Database::open(config.base_path.join("chain"))?;
    let chain = ChainDb::open(db, &config.chain.genesis)?;
    if let Some(genesis) = chain.genesis_hash()? {
        info!("🔗 Genesis: {}", genesis);
    }
    let chain: Arc<dyn ChainStore> = Arc::new(chain);

    let link = HttpConsensusLink::new(&config.consensus_url)?;
    info!("📡 Consensus link: {}", link.endpoint());

    let executor = Executor::new(
        config.executor.clone(),
        config.chain.rules.clone(),
        chain,
        Arc::new(InstantFinality),
        Arc::new(link),
        false,
    )
    .await?;

    // A bind failure ends the process
    executor.start().await?;
    if let Some(addr) = executor.rpc_address().await {
        info!("🌐 RPC server: http://{}", addr);
    }
    info!("✅ Node started successfully");

    run_event_loop(&executor).await;

    info!("🛑 Shutting down...");
    executor.close().await;
    info!("👋 Node stopped cleanly");

    Ok(())
}

/// Periodic status until Ctrl+C
async fn run_event_loop(executor: &Executor) {
    let mut stats_interval = tokio::time::interval(Duration::from_secs(60));
    // Skip the immediate first tick
    stats_interval.tick().await;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("\n⚠️  Ctrl+C received, shutting down...");
                break;
            }
            _ = stats_interval.tick() => {
                let head = executor.pending_block().await;
                let pool = executor.pool();
                let pool = pool.read().await;
                match head {
                    Some(head) => info!(
                        "📊 Head #{} ({}) | pool {} txs ({} added, {} removed)",
                        head.number,
                        head.hash(),
                        pool.len(),
                        pool.stats().total_added,
                        pool.stats().total_removed
                    ),
                    None => warn!("📊 No committed baseline yet"),
                }
            }
        }
    }
}

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Consensus link error: {0}")]
    Link(#[from] LinkError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),
}
