// CLI Configuration - Convert CLI args to node config
// Principle: Clear mapping between user input and internal configuration

use crate::cli::RunCmd;
use crate::execution::validation::ValidationPolicy;
use crate::genesis::{dev_signing_key, ChainSpec};
use crate::node::mempool::MempoolConfig;
use crate::node::service::ExecutorConfig;
use crate::rpc::RpcConfig;
use crate::types::AccountId;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Complete node configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain rules and genesis
    pub chain: ChainSpec,
    /// Base data path
    pub base_path: PathBuf,
    /// Base URL of the consensus layer
    pub consensus_url: String,
    /// Executor settings (rounds, pool, policy, RPC)
    pub executor: ExecutorConfig,
}

impl NodeConfig {
    /// Create configuration from CLI run command
    pub fn from_run_cmd(cmd: &RunCmd) -> Result<Self, ConfigError> {
        let is_dev = cmd.chain == "dev";
        let chain = if is_dev {
            ChainSpec::dev()
        } else {
            Self::load_chain_spec(&cmd.chain)?
        };

        // Coinbase: explicit, or the funded dev account on the dev chain
        let coinbase = match cmd.coinbase {
            Some(coinbase) => coinbase,
            None if is_dev => AccountId::from_public_key(&dev_signing_key().verifying_key()),
            None => {
                warn!("No coinbase configured, rounds will be refused while mining");
                AccountId::ZERO
            }
        };

        if cmd.accept.is_empty() {
            return Err(ConfigError::EmptyAcceptSet);
        }
        let policy = ValidationPolicy {
            accept: cmd.accept.iter().copied().collect(),
            max_size: cmd.max_tx_size,
            min_tip: cmd.min_tip,
        };

        let rpc = RpcConfig {
            port: cmd.rpc_port,
            address: Self::parse_ip_addr(&cmd.rpc_addr)?,
            ..Default::default()
        };

        let executor = ExecutorConfig {
            recommit: Duration::from_millis(cmd.recommit_ms),
            gas_ceil: cmd.gas_ceil,
            coinbase,
            mempool: MempoolConfig {
                max_size: cmd.pool_size,
                policy,
                ..Default::default()
            },
            rpc,
        };

        info!("Chain spec: {} (chain id {})", chain.name, chain.rules.chain_id);

        Ok(Self {
            chain,
            base_path: cmd.get_base_path(),
            consensus_url: cmd.consensus_url.clone(),
            executor,
        })
    }

    /// Load chain spec from file
    fn load_chain_spec(path: &str) -> Result<ChainSpec, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::ChainSpecNotFound(path.to_string()));
        }
        ChainSpec::from_file(path).map_err(|e| ConfigError::ChainSpecReadError(e.to_string()))
    }

    /// Parse IP address string to bytes
    fn parse_ip_addr(addr: &str) -> Result<[u8; 4], ConfigError> {
        if addr == "localhost" {
            return Ok([127, 0, 0, 1]);
        }
        let parts: Vec<&str> = addr.split('.').collect();
        if parts.len() != 4 {
            return Err(ConfigError::InvalidIpAddress(addr.to_string()));
        }

        let mut bytes = [0u8; 4];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = part
                .parse()
                .map_err(|_| ConfigError::InvalidIpAddress(addr.to_string()))?;
        }

        Ok(bytes)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Chain spec not found: {0}")]
    ChainSpecNotFound(String),

    #[error("Failed to read chain spec: {0}")]
    ChainSpecReadError(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("At least one transaction kind must be accepted")]
    EmptyAcceptSet,
}
