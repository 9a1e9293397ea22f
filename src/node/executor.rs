// Executor - Deterministic replay and commit of consensus-finalized batches
use super::environment::{ExecutionEnvironment, WorkContext, WorkError};
use super::handoff::HandoffReceiver;
use super::mempool::TransactionPool;
use crate::consensus::engine::Engine;
use crate::execution::gas::TX_GAS;
use crate::execution::state_transition::ApplyError;
use crate::storage::chain::ChainError;
use crate::types::{Block, Log, Receipt, SignedTransaction, Timestamp};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, trace};

/// Transactions in the order agreed by consensus
#[derive(Debug, Clone)]
pub struct FinalizedBatch {
    /// Arrival time (unix seconds), used as the block timestamp
    pub received_at: Timestamp,
    pub txs: Vec<SignedTransaction>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Work: {0}")]
    Work(#[from] WorkError),

    #[error("Failed writing block to chain: {0}")]
    Chain(#[from] ChainError),
}

pub struct BatchExecutor {
    work: WorkContext,
    engine: Arc<dyn Engine>,
    pool: Arc<RwLock<TransactionPool>>,
}

impl BatchExecutor {
    pub fn new(work: WorkContext, engine: Arc<dyn Engine>, pool: Arc<RwLock<TransactionPool>>) -> Self {
        Self { work, engine, pool }
    }

    /// Serve finalized batches until shutdown
    pub async fn run(self, mut batches: HandoffReceiver<FinalizedBatch>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                batch = batches.recv() => match batch {
                    Some(batch) => {
                        if let Err(e) = self.execute_batch(batch).await {
                            match e {
                                ExecutionError::Chain(_) => error!("{}", e),
                                ExecutionError::Work(_) => debug!("Batch dropped: {}", e),
                            }
                        }
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        info!("Batch executor stopped");
    }

    /// Replay a batch on the current head and commit the resulting block
    pub async fn execute_batch(&self, batch: FinalizedBatch) -> Result<Block, ExecutionError> {
        let mut env = self.work.prepare(batch.received_at).await?;
        let logs = self.execute_transactions(&mut env, &batch.txs);
        debug!(
            "Replayed batch #{}: {}/{} included, {} logs",
            env.header.number,
            env.tcount(),
            batch.txs.len(),
            logs.len()
        );
        self.write_to_chain(env).await
    }

    /// Replay `txs` in order. Transactions that do not fit or fail are
    /// skipped without side effects. Returns the logs of included ones.
    pub fn execute_transactions(&self, env: &mut ExecutionEnvironment, txs: &[SignedTransaction]) -> Vec<Log> {
        let number = env.header.number;
        let mut coalesced = Vec::new();

        for tx in txs {
            let remaining = env.gas_pool().gas();
            if remaining < TX_GAS {
                trace!("Not enough gas for further transactions: have {}, want {}", remaining, TX_GAS);
                break;
            }
            if remaining < tx.gas() {
                trace!("Not enough gas left for {}: left {}, needed {}", tx.hash(), remaining, tx.gas());
                continue;
            }
            if !self.work.rules.replay_policy_allows(&tx.transaction, number) {
                trace!("Ignoring replay protected transaction {}", tx.hash());
                continue;
            }

            match env.apply_transaction(&self.work.rules, tx) {
                Ok(receipt) => {
                    coalesced.extend(receipt.logs.iter().cloned());
                    env.push(tx.clone(), receipt);
                }
                Err(e @ ApplyError::NonceTooLow { .. }) => {
                    trace!("Skipping transaction {} with low nonce: {}", tx.hash(), e);
                }
                Err(e) => {
                    debug!("Transaction {} failed, skipped: {}", tx.hash(), e);
                }
            }
        }

        coalesced
    }

    /// Assemble, persist and publish the block built in `env`
    pub async fn write_to_chain(&self, mut env: ExecutionEnvironment) -> Result<Block, ExecutionError> {
        let txs = env.txs().to_vec();
        let sealed = env.receipts().to_vec();
        let block = self
            .engine
            .finalize_and_assemble(env.header.clone(), &mut env.state, txs, &sealed);
        let hash = block.hash();
        let number = block.number();

        let mut logs = Vec::new();
        let receipts: Vec<Receipt> = sealed
            .into_iter()
            .enumerate()
            .map(|(index, mut receipt)| {
                receipt.block_hash = hash;
                receipt.block_number = number;
                receipt.tx_index = index as u32;
                for log in receipt.logs.iter_mut() {
                    log.block_hash = hash;
                    log.block_number = number;
                }
                logs.extend(receipt.logs.iter().cloned());
                receipt
            })
            .collect();

        self.work
            .chain
            .write_block_and_set_head(&block, &receipts, &logs, &env.state)?;

        info!(
            "✅ Block #{} committed ({} txs, {} gas) - {}",
            number,
            block.transactions.len(),
            block.header.gas_used,
            hash
        );

        // The committed environment becomes the baseline as a whole
        env.header = block.header.clone();
        let baseline = Arc::new(env);
        self.pool.write().await.reset(&baseline.state);
        self.work.shared.write().await.env = Some(baseline);

        Ok(block)
    }
}
