// Mempool - Pending transaction pool
//
// Features:
// - Local/remote partition (locals are exempt from the minimum tip)
// - Per-account nonce tracking with gap limit
// - Replace-by-fee (RBF) support
// - Validation against the published baseline before acceptance

use crate::execution::validation::{validate_transaction, ValidationError, ValidationOutcome, ValidationPolicy};
use crate::storage::state::StateDb;
use crate::types::{AccountId, Balance, Hash, Header, Nonce, SignedTransaction, SignerRules};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Maximum allowed nonce gap above the next executable nonce
const MAX_NONCE_GAP: u64 = 16;

/// Mempool configuration
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions in pool
    pub max_size: usize,

    /// Maximum transactions per account
    pub max_per_account: usize,

    /// Replace-by-fee minimum increase (percentage)
    pub rbf_min_increase_pct: u8,

    pub max_nonce_gap: u64,

    /// Admission policy shared with transaction verification
    pub policy: ValidationPolicy,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            max_per_account: 100,
            rbf_min_increase_pct: 10,
            max_nonce_gap: MAX_NONCE_GAP,
            policy: ValidationPolicy::default(),
        }
    }
}

/// Executable transactions grouped by origin, each account nonce-ascending
/// and contiguous from its state nonce
#[derive(Debug, Clone, Default)]
pub struct PendingPartition {
    pub locals: BTreeMap<AccountId, Vec<SignedTransaction>>,
    pub remotes: BTreeMap<AccountId, Vec<SignedTransaction>>,
}

impl PendingPartition {
    pub fn len(&self) -> usize {
        self.locals.values().chain(self.remotes.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TRANSACTION POOL
// =============================================================================

pub struct TransactionPool {
    /// Configuration (public for test access)
    pub config: MempoolConfig,

    /// All transactions by hash
    transactions: HashMap<Hash, SignedTransaction>,

    /// Per-account nonce index
    accounts: BTreeMap<AccountId, BTreeMap<Nonce, Hash>>,

    /// State nonce of each tracked account, as of the last add or reset
    state_nonces: HashMap<AccountId, Nonce>,

    /// Accounts that submitted through the local endpoint
    locals: HashSet<AccountId>,

    /// Statistics
    stats: PoolStats,
}

/// Pool statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Total transactions added
    pub total_added: u64,
    /// Total transactions removed (included or stale)
    pub total_removed: u64,
    /// Total rejected (validation failed)
    pub total_rejected: u64,
    /// Total replaced (RBF)
    pub total_replaced: u64,
}

/// Pool errors
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Transaction already exists")]
    AlreadyExists,

    #[error("Pool is full")]
    PoolFull,

    #[error("Nonce too old: {got} < current {current}")]
    NonceTooOld { got: Nonce, current: Nonce },

    #[error("Nonce gap too large: {got} > max {max}")]
    NonceGap { got: Nonce, max: Nonce },

    #[error("Insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: Balance, have: Balance },

    #[error("Too many transactions for account: {count} >= {max}")]
    TooManyPerAccount { count: usize, max: usize },

    #[error("RBF fee increase insufficient: need {need_pct}% increase")]
    RbfFeeInsufficient { need_pct: u8 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl TransactionPool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: HashMap::new(),
            accounts: BTreeMap::new(),
            state_nonces: HashMap::new(),
            locals: HashSet::new(),
            stats: PoolStats::default(),
        }
    }

    /// Add a transaction submitted locally. Exempt from the minimum tip.
    pub fn add_local(
        &mut self,
        tx: SignedTransaction,
        header: &Header,
        signer: &SignerRules,
        state: &StateDb,
    ) -> Result<Hash, PoolError> {
        self.add(tx, true, header, signer, state)
    }

    /// Add a transaction received from elsewhere
    pub fn add_remote(
        &mut self,
        tx: SignedTransaction,
        header: &Header,
        signer: &SignerRules,
        state: &StateDb,
    ) -> Result<Hash, PoolError> {
        self.add(tx, false, header, signer, state)
    }

    fn add(
        &mut self,
        tx: SignedTransaction,
        local: bool,
        header: &Header,
        signer: &SignerRules,
        state: &StateDb,
    ) -> Result<Hash, PoolError> {
        let result = self.try_add(tx, local, header, signer, state);
        if result.is_err() {
            self.stats.total_rejected += 1;
        }
        result
    }

    fn try_add(
        &mut self,
        tx: SignedTransaction,
        local: bool,
        header: &Header,
        signer: &SignerRules,
        state: &StateDb,
    ) -> Result<Hash, PoolError> {
        let hash = tx.hash();
        if self.transactions.contains_key(&hash) {
            return Err(PoolError::AlreadyExists);
        }

        let outcome = if local {
            let mut policy = self.config.policy.clone();
            policy.min_tip = 0;
            validate_transaction(&tx, header, signer, &policy)
        } else {
            validate_transaction(&tx, header, signer, &self.config.policy)
        };
        if let ValidationOutcome::Rejected(reason) = outcome {
            return Err(PoolError::Validation(reason));
        }

        // Stateful checks
        let sender = tx.sender;
        let nonce = tx.nonce();
        let current = state.nonce(&sender);
        if nonce < current {
            return Err(PoolError::NonceTooOld { got: nonce, current });
        }
        let max = current.saturating_add(self.config.max_nonce_gap);
        if nonce > max {
            return Err(PoolError::NonceGap { got: nonce, max });
        }
        let have = state.balance(&sender);
        let need = tx.transaction.cost();
        if have < need {
            return Err(PoolError::InsufficientBalance { need, have });
        }

        // Replacement of the same (sender, nonce)
        let existing = self
            .accounts
            .get(&sender)
            .and_then(|queue| queue.get(&nonce))
            .copied();
        match existing {
            Some(existing_hash) => self.check_replacement(&tx, &existing_hash)?,
            None => {
                if self.transactions.len() >= self.config.max_size {
                    return Err(PoolError::PoolFull);
                }
                let count = self.accounts.get(&sender).map(BTreeMap::len).unwrap_or(0);
                if count >= self.config.max_per_account {
                    return Err(PoolError::TooManyPerAccount {
                        count,
                        max: self.config.max_per_account,
                    });
                }
            }
        }

        if let Some(existing_hash) = existing {
            self.transactions.remove(&existing_hash);
            self.stats.total_replaced += 1;
            info!("🔄 Transaction replaced via RBF: {} -> {}", existing_hash, hash);
        }

        self.accounts.entry(sender).or_default().insert(nonce, hash);
        self.state_nonces.insert(sender, current);
        if local {
            self.locals.insert(sender);
        }
        self.transactions.insert(hash, tx);
        self.stats.total_added += 1;

        debug!(
            "✅ Transaction {} added to pool (local={}, total={})",
            hash,
            local,
            self.transactions.len()
        );
        Ok(hash)
    }

    /// Both the tip and the fee cap must rise by the configured percentage
    fn check_replacement(&self, new_tx: &SignedTransaction, existing_hash: &Hash) -> Result<(), PoolError> {
        let existing = match self.transactions.get(existing_hash) {
            Some(tx) => &tx.transaction,
            None => return Ok(()),
        };
        let pct = self.config.rbf_min_increase_pct as u128;
        let bumped = |old: u128| old.saturating_add(old.saturating_mul(pct) / 100);

        let new = &new_tx.transaction;
        if new.gas_tip_cap() < bumped(existing.gas_tip_cap())
            || new.gas_fee_cap() < bumped(existing.gas_fee_cap())
        {
            return Err(PoolError::RbfFeeInsufficient {
                need_pct: self.config.rbf_min_increase_pct,
            });
        }
        Ok(())
    }

    /// Executable transactions split into locals and remotes
    pub fn pending(&self) -> PendingPartition {
        let mut partition = PendingPartition::default();

        for (account, queue) in &self.accounts {
            let mut expected = self.state_nonces.get(account).copied().unwrap_or(0);
            let mut ready = Vec::new();
            for (nonce, hash) in queue.range(expected..) {
                if *nonce != expected {
                    break;
                }
                if let Some(tx) = self.transactions.get(hash) {
                    ready.push(tx.clone());
                }
                expected = expected.saturating_add(1);
            }
            if ready.is_empty() {
                continue;
            }

            if self.locals.contains(account) {
                partition.locals.insert(*account, ready);
            } else {
                partition.remotes.insert(*account, ready);
            }
        }

        partition
    }

    /// Accounts treated as local
    pub fn locals(&self) -> Vec<AccountId> {
        let mut locals: Vec<AccountId> = self.locals.iter().copied().collect();
        locals.sort();
        locals
    }

    /// Re-anchor every account on a newly committed state, dropping
    /// transactions whose nonce is already used
    pub fn reset(&mut self, state: &StateDb) {
        let mut removed = 0u64;

        for (account, queue) in self.accounts.iter_mut() {
            let current = state.nonce(account);
            self.state_nonces.insert(*account, current);

            let stale: Vec<Nonce> = queue.range(..current).map(|(nonce, _)| *nonce).collect();
            for nonce in stale {
                if let Some(hash) = queue.remove(&nonce) {
                    self.transactions.remove(&hash);
                    removed += 1;
                }
            }
        }

        let emptied: Vec<AccountId> = self
            .accounts
            .iter()
            .filter(|(_, queue)| queue.is_empty())
            .map(|(account, _)| *account)
            .collect();
        for account in emptied {
            self.accounts.remove(&account);
            self.state_nonces.remove(&account);
        }

        self.stats.total_removed += removed;
        if removed > 0 {
            debug!("🧹 Pool reset: {} transactions dropped, {} remain", removed, self.len());
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<&SignedTransaction> {
        self.transactions.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new(MempoolConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
