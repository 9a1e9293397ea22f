// Builder - Candidate batches streamed to the consensus layer
//
// Each round selects pending transactions best tip first (nonce order within an
// account), bounded by the block gas limit, and forwards them one by one.
// Nothing is executed here and the chain is never written.

use super::environment::{ExecutionEnvironment, WorkContext};
use super::handoff::HandoffReceiver;
use super::interrupt::{CancellationToken, InterruptSignal};
use super::mempool::TransactionPool;
use super::ordering::TransactionsByPriceAndNonce;
use super::scheduler::BuildRequest;
use crate::execution::gas::TX_GAS;
use crate::rpc::gateway::ConsensusGateway;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace};

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("Round interrupted: {0:?}")]
    Interrupted(InterruptSignal),
}

pub struct CandidateBuilder {
    work: WorkContext,
    pool: Arc<RwLock<TransactionPool>>,
    gateway: ConsensusGateway,
}

impl CandidateBuilder {
    pub fn new(work: WorkContext, pool: Arc<RwLock<TransactionPool>>, gateway: ConsensusGateway) -> Self {
        Self { work, pool, gateway }
    }

    /// Serve build requests until shutdown
    pub async fn run(self, mut requests: HandoffReceiver<BuildRequest>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        self.build_round(request).await;
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        info!("Candidate builder stopped");
    }

    /// One round. Returns how many transactions were forwarded.
    pub async fn build_round(&self, request: BuildRequest) -> usize {
        let mut env = match self.work.prepare(request.timestamp).await {
            Ok(env) => env,
            Err(e) => {
                debug!("Build round abandoned: {}", e);
                return 0;
            }
        };

        match self.fill_transactions(&request.token, &mut env).await {
            Ok(sent) => {
                debug!("Round #{} forwarded {} transactions", env.header.number, sent);
                sent
            }
            Err(e) => {
                debug!("Round #{}: {}", env.header.number, e);
                0
            }
        }
    }

    /// Forward local transactions first, then remote ones
    pub async fn fill_transactions(
        &self,
        token: &CancellationToken,
        env: &mut ExecutionEnvironment,
    ) -> Result<usize, BuildError> {
        let pending = self.pool.read().await.pending();
        let base_fee = env.header.base_fee;

        let mut sent = 0;
        for partition in [pending.locals, pending.remotes] {
            if partition.is_empty() {
                continue;
            }
            let txs = TransactionsByPriceAndNonce::new(partition, base_fee);
            sent += self.send_transactions(env, txs, token).await?;
        }
        Ok(sent)
    }

    /// Greedy selection loop over one ordered set
    pub async fn send_transactions(
        &self,
        env: &mut ExecutionEnvironment,
        mut txs: TransactionsByPriceAndNonce,
        token: &CancellationToken,
    ) -> Result<usize, BuildError> {
        let number = env.header.number;
        let mut sent = 0;

        loop {
            let signal = token.load();
            if signal != InterruptSignal::None {
                return Err(BuildError::Interrupted(signal));
            }

            let remaining = env.gas_pool().gas();
            if remaining < TX_GAS {
                trace!("Not enough gas for further transactions: have {}, want {}", remaining, TX_GAS);
                break;
            }

            let Some(tx) = txs.peek().cloned() else {
                break;
            };

            if remaining < tx.gas() {
                trace!("Not enough gas left for {}: left {}, needed {}", tx.hash(), remaining, tx.gas());
                txs.pop();
                continue;
            }

            if !self.work.rules.replay_policy_allows(&tx.transaction, number) {
                trace!("Ignoring replay protected transaction {}", tx.hash());
                txs.pop();
                continue;
            }

            if let Err(e) = self.gateway.submit_transaction(&tx).await {
                trace!("Failed to send transaction {}: {}", tx.hash(), e);
                txs.pop();
                continue;
            }

            // Declared gas is reserved, fits by the check above
            if env.gas_pool().sub_gas(tx.gas()).is_err() {
                break;
            }
            txs.shift();
            sent += 1;
        }

        Ok(sent)
    }
}
