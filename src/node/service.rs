// Service - Executor orchestrator
// Principle: three loops, one shared baseline, explicit lifecycle

use super::builder::CandidateBuilder;
use super::environment::{ExecutionEnvironment, SharedHandle, SharedState, WorkContext};
use super::executor::BatchExecutor;
use super::handoff::handoff;
use super::mempool::{MempoolConfig, TransactionPool};
use super::scheduler::RoundScheduler;
use crate::consensus::engine::Engine;
use crate::execution::gas::DEFAULT_GAS_CEIL;
use crate::rpc::client::ConsensusLink;
use crate::rpc::gateway::ConsensusGateway;
use crate::rpc::server::{RpcConfig, RpcServer, RpcServerError, RpcServerHandle};
use crate::storage::chain::{ChainError, ChainStore};
use crate::types::{AccountId, ChainRules, Gas, Header};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Interval between candidate rounds
    pub recommit: Duration,

    /// Gas limit the chain is steered towards
    pub gas_ceil: Gas,

    pub coinbase: AccountId,

    /// Pool settings, including the admission policy shared with VerifyTx
    pub mempool: MempoolConfig,

    pub rpc: RpcConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            recommit: Duration::from_secs(1),
            gas_ceil: DEFAULT_GAS_CEIL,
            coinbase: AccountId::ZERO,
            mempool: MempoolConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// The execution layer node: schedules candidate rounds, replays finalized
/// batches and serves the consensus layer.
pub struct Executor {
    config: ExecutorConfig,

    /// Coinbase and last committed environment
    shared: SharedHandle,

    running: Arc<AtomicBool>,
    start_tx: mpsc::Sender<()>,
    shutdown_tx: broadcast::Sender<()>,

    pool: Arc<RwLock<TransactionPool>>,
    gateway: ConsensusGateway,

    tasks: Mutex<Vec<JoinHandle<()>>>,
    server: Mutex<Option<RpcServerHandle>>,
}

impl Executor {
    /// Wire the executor and spawn its loops. With `init`, a first round is
    /// requested right away.
    pub async fn new(
        config: ExecutorConfig,
        rules: ChainRules,
        chain: Arc<dyn ChainStore>,
        engine: Arc<dyn Engine>,
        link: Arc<dyn ConsensusLink>,
        init: bool,
    ) -> Result<Self, NodeError> {
        let pool = Arc::new(RwLock::new(TransactionPool::new(config.mempool.clone())));

        // Baseline from the current head, so verification never runs without one
        let head = chain.current_header()?;
        let state = chain.state_at(&head.state_root)?;
        let signer = rules.signer_rules(head.number, head.timestamp);
        pool.write().await.reset(&state);
        let baseline = ExecutionEnvironment::new(signer, state, config.coinbase, head);
        info!("Executor baseline at #{} ({})", baseline.header.number, baseline.header.hash());

        let shared: SharedHandle = Arc::new(RwLock::new(SharedState {
            coinbase: config.coinbase,
            env: Some(Arc::new(baseline)),
        }));
        let running = Arc::new(AtomicBool::new(false));

        let (start_tx, start_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (request_tx, request_rx) = handoff();
        let (batch_tx, batch_rx) = handoff();

        let gateway = ConsensusGateway::new(
            link,
            batch_tx,
            shared.clone(),
            pool.clone(),
            config.mempool.policy.clone(),
        );

        let work = WorkContext {
            chain,
            rules,
            gas_ceil: config.gas_ceil,
            shared: shared.clone(),
            running: running.clone(),
        };

        let scheduler = RoundScheduler::new(
            config.recommit,
            running.clone(),
            start_rx,
            request_tx,
            shutdown_tx.subscribe(),
        );
        let builder = CandidateBuilder::new(work.clone(), pool.clone(), gateway.clone());
        let executor = BatchExecutor::new(work, engine, pool.clone());

        let tasks = vec![
            tokio::spawn(builder.run(request_rx, shutdown_tx.subscribe())),
            tokio::spawn(executor.run(batch_rx, shutdown_tx.subscribe())),
            tokio::spawn(scheduler.run()),
        ];

        if init {
            let _ = start_tx.try_send(());
        }

        Ok(Self {
            config,
            shared,
            running,
            start_tx,
            shutdown_tx,
            pool,
            gateway,
            tasks: Mutex::new(tasks),
            server: Mutex::new(None),
        })
    }

    /// Enable mining, open the RPC listener and request a round
    pub async fn start(&self) -> Result<(), NodeError> {
        self.running.store(true, Ordering::SeqCst);

        {
            let mut server = self.server.lock().await;
            if server.is_none() {
                let handle = RpcServer::new(self.config.rpc.clone()).start_background(self.gateway.clone())?;
                *server = Some(handle);
            }
        }

        if self.start_tx.try_send(()).is_err() {
            debug!("Start signal already pending");
        }
        info!("⛏️  Executor started");
        Ok(())
    }

    /// Disable mining. Loops keep serving.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Executor stopped");
    }

    /// Tear everything down. Not meant to be called twice.
    pub async fn close(&self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(server) = self.server.lock().await.take() {
            server.stop().await;
        }

        let _ = self.shutdown_tx.send(());
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Executor loop ended abnormally: {}", e);
            }
        }
        info!("Executor closed");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn coinbase(&self) -> AccountId {
        self.shared.read().await.coinbase
    }

    pub async fn set_coinbase(&self, coinbase: AccountId) {
        self.shared.write().await.coinbase = coinbase;
    }

    /// Header of the last committed block
    pub async fn pending_block(&self) -> Option<Header> {
        self.shared
            .read()
            .await
            .env
            .as_ref()
            .map(|env| env.header.clone())
    }

    /// Address the RPC server listens on, once started
    pub async fn rpc_address(&self) -> Option<std::net::SocketAddr> {
        self.server.lock().await.as_ref().map(RpcServerHandle::address)
    }

    pub fn pool(&self) -> Arc<RwLock<TransactionPool>> {
        self.pool.clone()
    }

    pub fn gateway(&self) -> &ConsensusGateway {
        &self.gateway
    }
}

/// Node errors
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcServerError),
}
