// Block - Headers, blocks, receipts and logs
use super::account::AccountId;
use super::primitives::{Balance, BlockNumber, Gas, Hash, Timestamp};
use super::transaction::{SignedTransaction, TxKind};
use serde::{Deserialize, Serialize};

/// Block header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: Hash,
    pub number: BlockNumber,
    pub gas_limit: Gas,
    pub gas_used: Gas,
    pub timestamp: Timestamp,

    /// Recipient of transaction tips
    pub coinbase: AccountId,

    /// Present once dynamic fees are active
    pub base_fee: Option<Balance>,

    pub state_root: Hash,
    pub transactions_root: Hash,
    pub receipts_root: Hash,
}

impl Header {
    /// Block hash: Blake3 of the canonical header encoding
    pub fn hash(&self) -> Hash {
        match bincode::serialize(self) {
            Ok(bytes) => Hash::hash(&bytes),
            Err(_) => {
                // Fallback: hash key fields manually
                let mut data = Vec::new();
                data.extend_from_slice(self.parent_hash.as_bytes());
                data.extend_from_slice(&self.number.to_le_bytes());
                data.extend_from_slice(self.state_root.as_bytes());
                data.extend_from_slice(&self.timestamp.to_le_bytes());
                Hash::hash(&data)
            }
        }
    }
}

/// Full block. No uncles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<SignedTransaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }
}

/// Event emitted during execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: AccountId,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,

    // Filled in when the block is assembled
    pub block_number: BlockNumber,
    pub block_hash: Hash,
    pub tx_hash: Hash,
    pub tx_index: u32,
    pub log_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Failed,
    Successful,
}

/// Outcome of one executed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub kind: TxKind,
    pub status: ReceiptStatus,

    /// Gas used by this and all previous transactions of the block
    pub cumulative_gas_used: Gas,
    pub gas_used: Gas,
    pub tx_hash: Hash,

    /// Set when the transaction created an account
    pub contract_address: Option<AccountId>,
    pub logs: Vec<Log>,

    pub block_hash: Hash,
    pub block_number: BlockNumber,
    pub tx_index: u32,
}

impl Receipt {
    /// Canonical bytes used for the receipts root
    pub fn consensus_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.kind,
            self.status,
            self.cumulative_gas_used,
            &self
                .logs
                .iter()
                .map(|l| (l.address, l.topics.clone(), l.data.clone()))
                .collect::<Vec<_>>(),
        ))
        .unwrap_or_default()
    }
}
