// Chain rules - Fork schedule and protocol constants
use super::primitives::{Balance, BlockNumber, Timestamp, GWEI};
use super::transaction::{Transaction, TxKind};
use serde::{Deserialize, Serialize};

/// Bound divisor of the base fee, limits the change per block
pub const DEFAULT_BASE_FEE_CHANGE_DENOMINATOR: u64 = 8;

/// Bounds the maximum gas limit a dynamic-fee block may have
pub const DEFAULT_ELASTICITY_MULTIPLIER: u64 = 2;

/// Base fee of the first dynamic-fee block
pub const DEFAULT_INITIAL_BASE_FEE: Balance = GWEI;

/// Protocol rules of a chain, activated by block number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRules {
    /// Chain identifier bound into replay-protected signatures
    pub chain_id: u64,

    /// Activation of replay-protected signatures
    pub eip155_block: Option<BlockNumber>,

    /// Activation of access-list transactions
    pub berlin_block: Option<BlockNumber>,

    /// Activation of dynamic-fee transactions and the base fee
    pub london_block: Option<BlockNumber>,

    /// Reject transactions that are not bound to a chain id
    #[serde(default)]
    pub require_replay_protection: bool,

    #[serde(default = "default_elasticity")]
    pub elasticity_multiplier: u64,

    #[serde(default = "default_denominator")]
    pub base_fee_change_denominator: u64,

    #[serde(default = "default_initial_base_fee")]
    pub initial_base_fee: Balance,
}

fn default_elasticity() -> u64 {
    DEFAULT_ELASTICITY_MULTIPLIER
}

fn default_denominator() -> u64 {
    DEFAULT_BASE_FEE_CHANGE_DENOMINATOR
}

fn default_initial_base_fee() -> Balance {
    DEFAULT_INITIAL_BASE_FEE
}

fn is_active(fork: Option<BlockNumber>, number: BlockNumber) -> bool {
    matches!(fork, Some(block) if block <= number)
}

impl ChainRules {
    /// Development chain: every fork active from genesis
    pub fn dev(chain_id: u64) -> Self {
        Self {
            chain_id,
            eip155_block: Some(0),
            berlin_block: Some(0),
            london_block: Some(0),
            require_replay_protection: false,
            elasticity_multiplier: DEFAULT_ELASTICITY_MULTIPLIER,
            base_fee_change_denominator: DEFAULT_BASE_FEE_CHANGE_DENOMINATOR,
            initial_base_fee: DEFAULT_INITIAL_BASE_FEE,
        }
    }

    pub fn is_eip155(&self, number: BlockNumber) -> bool {
        is_active(self.eip155_block, number)
    }

    pub fn is_berlin(&self, number: BlockNumber) -> bool {
        is_active(self.berlin_block, number)
    }

    pub fn is_london(&self, number: BlockNumber) -> bool {
        is_active(self.london_block, number)
    }

    /// Signature rules in force for a block
    pub fn signer_rules(&self, number: BlockNumber, _time: Timestamp) -> SignerRules {
        SignerRules {
            chain_id: self.chain_id,
            replay_protected: self.is_eip155(number),
            access_list: self.is_berlin(number),
            dynamic_fee: self.is_london(number),
            require_replay_protection: self.require_replay_protection,
        }
    }

    /// Whether a transaction may be included in block `number`.
    ///
    /// A protected transaction is ignored until replay protection activates,
    /// an unprotected one is ignored when the chain mandates protection.
    pub fn replay_policy_allows(&self, tx: &Transaction, number: BlockNumber) -> bool {
        if tx.protected() {
            self.is_eip155(number)
        } else {
            !self.require_replay_protection
        }
    }
}

impl Default for ChainRules {
    fn default() -> Self {
        Self::dev(1337)
    }
}

/// Signature rule-set derived from the chain rules at one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignerRules {
    pub chain_id: u64,
    pub replay_protected: bool,
    pub access_list: bool,
    pub dynamic_fee: bool,
    pub require_replay_protection: bool,
}

impl SignerRules {
    /// Whether the signer understands this transaction kind
    pub fn supports(&self, kind: TxKind) -> bool {
        match kind {
            TxKind::Legacy => true,
            TxKind::AccessList => self.access_list,
            TxKind::DynamicFee => self.dynamic_fee,
        }
    }
}
