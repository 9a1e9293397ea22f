// Spécification du genesis block
use crate::execution::gas::DEFAULT_GAS_CEIL;
use crate::storage::state::StateDb;
use crate::types::*;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed genesis timestamp for deterministic genesis hash across nodes
/// 2025-01-01 00:00:00 UTC
const GENESIS_TIMESTAMP: u64 = 1735689600;

/// Seed of the funded development account
const DEV_ACCOUNT_SEED: [u8; 32] = [0x42; 32];

/// Compte initial avec sa balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub account: AccountId,
    pub balance: Balance,
}

/// Spécification du genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisSpec {
    /// Timestamp du genesis
    pub timestamp: Timestamp,

    pub gas_limit: Gas,

    /// Base fee of the genesis header, if dynamic fees start at genesis
    #[serde(default)]
    pub base_fee: Option<Balance>,

    /// Comptes initiaux avec leurs balances
    pub alloc: Vec<GenesisAccount>,
}

/// Signing key of the funded development account
pub fn dev_signing_key() -> SigningKey {
    SigningKey::from_bytes(&DEV_ACCOUNT_SEED)
}

impl GenesisSpec {
    /// Development genesis: one richly funded account
    pub fn dev() -> Self {
        let dev_account = AccountId::from_public_key(&dev_signing_key().verifying_key());
        Self {
            timestamp: GENESIS_TIMESTAMP,
            gas_limit: DEFAULT_GAS_CEIL,
            base_fee: Some(DEFAULT_INITIAL_BASE_FEE),
            alloc: vec![GenesisAccount {
                account: dev_account,
                balance: 1_000_000 * ETHER,
            }],
        }
    }
}

impl Default for GenesisSpec {
    fn default() -> Self {
        Self::dev()
    }
}

/// Builder pour le bloc genesis
pub struct GenesisBuilder<'a> {
    spec: &'a GenesisSpec,
}

impl<'a> GenesisBuilder<'a> {
    pub fn new(spec: &'a GenesisSpec) -> Self {
        Self { spec }
    }

    /// Construit le bloc genesis et l'état initial
    pub fn build(&self) -> (Block, StateDb) {
        // Duplicate entries accumulate
        let mut balances: BTreeMap<AccountId, Balance> = BTreeMap::new();
        for entry in &self.spec.alloc {
            let balance = balances.entry(entry.account).or_insert(0);
            *balance = balance.saturating_add(entry.balance);
        }
        let state = StateDb::from_accounts(
            balances
                .into_iter()
                .map(|(id, balance)| (id, AccountInfo::with_balance(balance))),
        );

        let header = Header {
            parent_hash: Hash::ZERO,
            number: 0,
            gas_limit: self.spec.gas_limit,
            gas_used: 0,
            timestamp: self.spec.timestamp,
            coinbase: AccountId::ZERO,
            base_fee: self.spec.base_fee,
            state_root: state.root(),
            transactions_root: Hash::ZERO,
            receipts_root: Hash::ZERO,
        };

        (Block::new(header, vec![]), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_genesis() {
        let spec = GenesisSpec::dev();
        let (block, state) = GenesisBuilder::new(&spec).build();

        assert_eq!(block.number(), 0);
        assert_eq!(block.header.parent_hash, Hash::ZERO);
        assert_eq!(block.header.state_root, state.root());

        let dev = AccountId::from_public_key(&dev_signing_key().verifying_key());
        assert_eq!(state.balance(&dev), 1_000_000 * ETHER);
    }

    #[test]
    fn test_genesis_hash_deterministic() {
        let spec = GenesisSpec::dev();
        let (a, _) = GenesisBuilder::new(&spec).build();
        let (b, _) = GenesisBuilder::new(&spec).build();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_duplicate_alloc_accumulates() {
        let account = AccountId::from_bytes([3; 32]);
        let spec = GenesisSpec {
            alloc: vec![
                GenesisAccount { account, balance: 5 },
                GenesisAccount { account, balance: 7 },
            ],
            ..GenesisSpec::dev()
        };
        let (_, state) = GenesisBuilder::new(&spec).build();
        assert_eq!(state.balance(&account), 12);
    }
}
