// Gateway - Boundary between the executor and the consensus layer
//
// Outbound: candidate transactions are streamed to consensus as client packets.
// Inbound: finalized batches are handed to the batch executor, and single
// transactions are verified against the last committed baseline.

use super::client::{ConsensusLink, LinkError};
use super::types::{ExecBlock, Packet, ProtoTransaction, Request};
use crate::execution::validation::{validate_transaction, ValidationError, ValidationOutcome, ValidationPolicy};
use crate::node::environment::{ExecutionEnvironment, SharedHandle};
use crate::node::executor::FinalizedBatch;
use crate::node::handoff::{HandoffClosed, HandoffSender};
use crate::node::mempool::{PoolError, TransactionPool};
use crate::types::{unix_now, Hash, SignedTransaction, TxCodecError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Encoding failed: {0}")]
    Encode(#[from] TxCodecError),

    #[error("Packet serialization failed: {0}")]
    Packet(String),

    #[error("Consensus link: {0}")]
    Link(#[from] LinkError),

    /// Partial success: the decodable entries were still executed
    #[error("There are {count} errors in the block")]
    MalformedEntries { count: usize },

    #[error("Executor: {0}")]
    ExecutorClosed(#[from] HandoffClosed),

    #[error("Rejected: {0}")]
    Rejected(ValidationError),

    #[error("Pool: {0}")]
    Pool(#[from] PoolError),
}

#[derive(Clone)]
pub struct ConsensusGateway {
    link: Arc<dyn ConsensusLink>,
    commits: HandoffSender<FinalizedBatch>,
    shared: SharedHandle,
    pool: Arc<RwLock<TransactionPool>>,
    policy: ValidationPolicy,
}

impl ConsensusGateway {
    pub fn new(
        link: Arc<dyn ConsensusLink>,
        commits: HandoffSender<FinalizedBatch>,
        shared: SharedHandle,
        pool: Arc<RwLock<TransactionPool>>,
        policy: ValidationPolicy,
    ) -> Self {
        Self {
            link,
            commits,
            shared,
            pool,
            policy,
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Forward one candidate transaction. Fire-and-forget, no retry.
    pub async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<(), GatewayError> {
        let request = Request {
            tx: ProtoTransaction::normal(tx)?,
        };
        let packet = Packet::client(&request).map_err(|e| GatewayError::Packet(e.to_string()))?;

        self.link.send_packet(packet).await?;
        Ok(())
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Decode a finalized batch and hand it to the executor loop.
    ///
    /// Blocks until the executor accepts the batch.
    pub async fn commit_finalized_batch(&self, block: ExecBlock) -> Result<(), GatewayError> {
        if block.txs.is_empty() {
            return Ok(());
        }

        let mut errors = 0usize;
        let mut txs = Vec::with_capacity(block.txs.len());
        for entry in &block.txs {
            match decode_entry(entry, self.policy.max_size) {
                Ok(tx) => txs.push(tx),
                Err(e) => {
                    debug!("Skipping malformed batch entry: {}", e);
                    errors += 1;
                }
            }
        }

        if !txs.is_empty() {
            self.commits
                .send(FinalizedBatch {
                    received_at: unix_now(),
                    txs,
                })
                .await?;
        }

        if errors > 0 {
            warn!("Finalized batch carried {} malformed entries", errors);
            return Err(GatewayError::MalformedEntries { count: errors });
        }
        Ok(())
    }

    /// Stateless check of a transaction against the committed baseline
    pub async fn verify_transaction(&self, envelope: &ProtoTransaction) -> ValidationOutcome {
        let tx = match self.open(envelope) {
            Ok(tx) => tx,
            Err(e) => return ValidationOutcome::Rejected(e),
        };

        let Some(env) = self.baseline().await else {
            return ValidationOutcome::Rejected(ValidationError::NoBaseline);
        };
        validate_transaction(&tx, &env.header, &env.signer, &self.policy)
    }

    /// Insert a locally submitted transaction into the pool
    pub async fn submit_local(&self, envelope: &ProtoTransaction) -> Result<Hash, GatewayError> {
        self.admit(envelope, true).await
    }

    /// Insert a transaction gossiped by a peer into the remote partition
    pub async fn relay_transaction(&self, envelope: &ProtoTransaction) -> Result<Hash, GatewayError> {
        self.admit(envelope, false).await
    }

    async fn admit(&self, envelope: &ProtoTransaction, local: bool) -> Result<Hash, GatewayError> {
        let tx = self.open(envelope).map_err(GatewayError::Rejected)?;
        let env = self
            .baseline()
            .await
            .ok_or(GatewayError::Rejected(ValidationError::NoBaseline))?;

        let mut pool = self.pool.write().await;
        let hash = if local {
            pool.add_local(tx, &env.header, &env.signer, &env.state)?
        } else {
            pool.add_remote(tx, &env.header, &env.signer, &env.state)?
        };
        Ok(hash)
    }

    /// Kind and wire size checks, then decode
    fn open(&self, envelope: &ProtoTransaction) -> Result<SignedTransaction, ValidationError> {
        if !envelope.is_executable() {
            return Err(ValidationError::NotExecutable);
        }
        check_wire_size(envelope, self.policy.max_size)?;
        Ok(envelope.decode_transaction()?)
    }

    async fn baseline(&self) -> Option<Arc<ExecutionEnvironment>> {
        self.shared.read().await.env.clone()
    }
}

/// Measured on the bytes received, before any decoding
fn check_wire_size(envelope: &ProtoTransaction, max: usize) -> Result<(), ValidationError> {
    let size = envelope.payload.len();
    if size > max {
        return Err(ValidationError::OversizedData { size, max });
    }
    Ok(())
}

fn decode_entry(entry: &[u8], max_size: usize) -> Result<SignedTransaction, ValidationError> {
    let envelope = ProtoTransaction::decode(entry)?;
    check_wire_size(&envelope, max_size)?;
    Ok(envelope.decode_transaction()?)
}
