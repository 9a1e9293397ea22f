// Environment - Per-round working context and its construction
use crate::execution::fees::calc_base_fee;
use crate::execution::gas::{calc_gas_limit, GasPool};
use crate::execution::state_transition::{apply_transaction, ApplyError};
use crate::storage::chain::{ChainError, ChainStore};
use crate::storage::state::StateDb;
use crate::types::{AccountId, ChainRules, Gas, Hash, Header, Receipt, SignedTransaction, SignerRules, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Mutable context of one building or execution round. `Clone` is a deep copy.
///
/// Invariant: `txs`, `receipts` and `tcount` always have the same length.
#[derive(Debug, Clone)]
pub struct ExecutionEnvironment {
    pub signer: SignerRules,
    pub state: StateDb,

    /// Created from the header gas limit on first use
    gas_pool: Option<GasPool>,

    pub coinbase: AccountId,
    pub header: Header,

    txs: Vec<SignedTransaction>,
    receipts: Vec<Receipt>,
    tcount: usize,
}

impl ExecutionEnvironment {
    pub fn new(signer: SignerRules, state: StateDb, coinbase: AccountId, header: Header) -> Self {
        Self {
            signer,
            state,
            gas_pool: None,
            coinbase,
            header,
            txs: Vec::new(),
            receipts: Vec::new(),
            tcount: 0,
        }
    }

    pub fn gas_pool(&mut self) -> &mut GasPool {
        let limit = self.header.gas_limit;
        self.gas_pool.get_or_insert_with(|| GasPool::new(limit))
    }

    /// Gas left for transactions, without creating the pool
    pub fn remaining_gas(&self) -> Gas {
        self.gas_pool
            .map(|pool| pool.gas())
            .unwrap_or(self.header.gas_limit)
    }

    /// Apply `tx` on top of the environment.
    ///
    /// On error the state and the gas pool are restored, so a failed
    /// transaction leaves no trace. Does not record the transaction.
    pub fn apply_transaction(&mut self, rules: &ChainRules, tx: &SignedTransaction) -> Result<Receipt, ApplyError> {
        let limit = self.header.gas_limit;
        let gas_pool = self.gas_pool.get_or_insert_with(|| GasPool::new(limit));

        let snapshot = self.state.snapshot();
        let gas = gas_pool.gas();
        self.state.set_tx_context(tx.hash(), self.tcount as u32);

        let result = apply_transaction(rules, &mut self.state, &mut self.header, gas_pool, &self.coinbase, tx);
        if result.is_err() {
            self.state.revert_to_snapshot(snapshot);
            gas_pool.set_gas(gas);
        }
        result
    }

    /// Record an included transaction with its receipt
    pub fn push(&mut self, tx: SignedTransaction, receipt: Receipt) {
        self.txs.push(tx);
        self.receipts.push(receipt);
        self.tcount += 1;
    }

    pub fn txs(&self) -> &[SignedTransaction] {
        &self.txs
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn tcount(&self) -> usize {
        self.tcount
    }
}

/// State shared by the loops and the RPC handlers, behind one lock
#[derive(Debug, Default)]
pub struct SharedState {
    pub coinbase: AccountId,

    /// Last committed environment. Replaced wholesale, never mutated in place.
    pub env: Option<Arc<ExecutionEnvironment>>,
}

pub type SharedHandle = Arc<RwLock<SharedState>>;

/// What every round needs to build its environment
#[derive(Clone)]
pub struct WorkContext {
    pub chain: Arc<dyn ChainStore>,
    pub rules: ChainRules,
    pub gas_ceil: Gas,
    pub shared: SharedHandle,
    pub running: Arc<AtomicBool>,
}

impl WorkContext {
    /// Coinbase of a round. Zero when not mining, refused when mining without one.
    pub async fn round_coinbase(&self) -> Result<AccountId, WorkError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(AccountId::ZERO);
        }
        let coinbase = self.shared.read().await.coinbase;
        if coinbase.is_zero() {
            error!("Refusing to mine without coinbase");
            return Err(WorkError::NoCoinbase);
        }
        Ok(coinbase)
    }

    /// Fresh environment on top of the current head
    pub async fn prepare(&self, timestamp: Timestamp) -> Result<ExecutionEnvironment, WorkError> {
        let coinbase = self.round_coinbase().await?;
        prepare_work(
            self.chain.as_ref(),
            &self.rules,
            self.gas_ceil,
            &GenerateParams {
                timestamp,
                parent_hash: None,
                coinbase,
            },
        )
    }
}

/// Parameters of a round
#[derive(Debug, Clone)]
pub struct GenerateParams {
    /// Requested block timestamp (unix seconds)
    pub timestamp: Timestamp,

    /// Explicit parent; the current head when `None`
    pub parent_hash: Option<Hash>,

    pub coinbase: AccountId,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("Missing parent {0}")]
    MissingParent(Hash),

    #[error("Refusing to mine without coinbase")]
    NoCoinbase,

    #[error("Chain: {0}")]
    Chain(#[from] ChainError),
}

/// Build an empty environment on top of the chosen parent
pub fn prepare_work(
    chain: &dyn ChainStore,
    rules: &ChainRules,
    gas_ceil: Gas,
    params: &GenerateParams,
) -> Result<ExecutionEnvironment, WorkError> {
    let parent = match params.parent_hash {
        Some(hash) => chain
            .header_by_hash(&hash)?
            .ok_or(WorkError::MissingParent(hash))?,
        None => chain.current_header()?,
    };

    let mut timestamp = params.timestamp;
    if parent.timestamp >= timestamp {
        timestamp = parent.timestamp + 1;
    }

    let number = parent.number + 1;
    let mut header = Header {
        parent_hash: parent.hash(),
        number,
        gas_limit: calc_gas_limit(parent.gas_limit, gas_ceil),
        timestamp,
        coinbase: params.coinbase,
        ..Default::default()
    };

    if rules.is_london(number) {
        header.base_fee = Some(calc_base_fee(rules, &parent));
        if !rules.is_london(parent.number) {
            let parent_gas_limit = parent.gas_limit.saturating_mul(rules.elasticity_multiplier);
            header.gas_limit = calc_gas_limit(parent_gas_limit, gas_ceil);
        }
    }

    let state = chain.state_at(&parent.state_root)?;
    let signer = rules.signer_rules(number, timestamp);

    debug!(
        "Prepared environment #{} on {} (gas limit {}, base fee {:?})",
        number,
        header.parent_hash,
        header.gas_limit,
        header.base_fee
    );

    Ok(ExecutionEnvironment::new(signer, state, params.coinbase, header))
}
