// Transaction - Typed transactions (legacy, access-list, dynamic-fee)
use super::account::AccountId;
use super::chain::SignerRules;
use super::primitives::{Balance, Gas, Hash, Nonce};
use super::signature::{domain_separate, Signature64, DOMAIN_TRANSACTION};
use bincode::Options;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// KINDS
// =============================================================================

/// Transaction type, carried as the first byte of the binary encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Legacy,
    AccessList,
    DynamicFee,
}

impl TxKind {
    pub const ALL: [TxKind; 3] = [TxKind::Legacy, TxKind::AccessList, TxKind::DynamicFee];

    pub fn tag(&self) -> u8 {
        match self {
            TxKind::Legacy => 0x00,
            TxKind::AccessList => 0x01,
            TxKind::DynamicFee => 0x02,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(TxKind::Legacy),
            0x01 => Some(TxKind::AccessList),
            0x02 => Some(TxKind::DynamicFee),
            _ => None,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TxKind::Legacy => "legacy",
            TxKind::AccessList => "access-list",
            TxKind::DynamicFee => "dynamic-fee",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "0" => Ok(TxKind::Legacy),
            "access-list" | "accesslist" | "1" => Ok(TxKind::AccessList),
            "dynamic-fee" | "dynamicfee" | "2" => Ok(TxKind::DynamicFee),
            other => Err(format!("Unknown transaction kind: {}", other)),
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Pre-declared account and storage slots touched by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTuple {
    pub address: AccountId,
    pub storage_keys: Vec<Hash>,
}

/// Single gas price. Absent chain id means the signature is not bound to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTx {
    pub chain_id: Option<u64>,
    pub nonce: Nonce,
    pub gas_price: Balance,
    pub gas: Gas,
    pub to: Option<AccountId>,
    pub value: Balance,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListTx {
    pub chain_id: u64,
    pub nonce: Nonce,
    pub gas_price: Balance,
    pub gas: Gas,
    pub to: Option<AccountId>,
    pub value: Balance,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessTuple>,
}

/// Priority fee plus fee cap, charged against the block base fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFeeTx {
    pub chain_id: u64,
    pub nonce: Nonce,
    pub max_priority_fee: Balance,
    pub max_fee: Balance,
    pub gas: Gas,
    pub to: Option<AccountId>,
    pub value: Balance,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessTuple>,
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Legacy(LegacyTx),
    AccessList(AccessListTx),
    DynamicFee(DynamicFeeTx),
}

impl Transaction {
    pub fn kind(&self) -> TxKind {
        match self {
            Transaction::Legacy(_) => TxKind::Legacy,
            Transaction::AccessList(_) => TxKind::AccessList,
            Transaction::DynamicFee(_) => TxKind::DynamicFee,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.chain_id,
            Transaction::AccessList(tx) => Some(tx.chain_id),
            Transaction::DynamicFee(tx) => Some(tx.chain_id),
        }
    }

    /// Whether the signature is bound to a chain id
    pub fn protected(&self) -> bool {
        self.chain_id().is_some()
    }

    pub fn nonce(&self) -> Nonce {
        match self {
            Transaction::Legacy(tx) => tx.nonce,
            Transaction::AccessList(tx) => tx.nonce,
            Transaction::DynamicFee(tx) => tx.nonce,
        }
    }

    pub fn gas(&self) -> Gas {
        match self {
            Transaction::Legacy(tx) => tx.gas,
            Transaction::AccessList(tx) => tx.gas,
            Transaction::DynamicFee(tx) => tx.gas,
        }
    }

    /// Maximum tip per gas offered to the coinbase
    pub fn gas_tip_cap(&self) -> Balance {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => tx.max_priority_fee,
        }
    }

    /// Maximum total price per gas
    pub fn gas_fee_cap(&self) -> Balance {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => tx.max_fee,
        }
    }

    pub fn to(&self) -> Option<AccountId> {
        match self {
            Transaction::Legacy(tx) => tx.to,
            Transaction::AccessList(tx) => tx.to,
            Transaction::DynamicFee(tx) => tx.to,
        }
    }

    pub fn value(&self) -> Balance {
        match self {
            Transaction::Legacy(tx) => tx.value,
            Transaction::AccessList(tx) => tx.value,
            Transaction::DynamicFee(tx) => tx.value,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Transaction::Legacy(tx) => &tx.data,
            Transaction::AccessList(tx) => &tx.data,
            Transaction::DynamicFee(tx) => &tx.data,
        }
    }

    pub fn access_list(&self) -> &[AccessTuple] {
        match self {
            Transaction::Legacy(_) => &[],
            Transaction::AccessList(tx) => &tx.access_list,
            Transaction::DynamicFee(tx) => &tx.access_list,
        }
    }

    /// Tip per gas the coinbase receives under `base_fee`.
    /// `None` when the fee cap cannot cover the base fee.
    pub fn effective_tip(&self, base_fee: Option<Balance>) -> Option<Balance> {
        match base_fee {
            None => Some(self.gas_tip_cap()),
            Some(base_fee) => {
                let headroom = self.gas_fee_cap().checked_sub(base_fee)?;
                Some(headroom.min(self.gas_tip_cap()))
            }
        }
    }

    /// Price per gas actually charged to the sender
    pub fn effective_gas_price(&self, base_fee: Option<Balance>) -> Balance {
        match base_fee {
            None => self.gas_fee_cap(),
            Some(base_fee) => self
                .gas_tip_cap()
                .saturating_add(base_fee)
                .min(self.gas_fee_cap()),
        }
    }

    /// Worst-case debit: gas * fee cap + value
    pub fn cost(&self) -> Balance {
        (self.gas() as Balance)
            .saturating_mul(self.gas_fee_cap())
            .saturating_add(self.value())
    }

    /// Message covered by the sender's signature
    pub fn signing_message(&self) -> Option<Vec<u8>> {
        let bytes = bincode::serialize(self).ok()?;
        Some(domain_separate(DOMAIN_TRANSACTION, &bytes))
    }

    /// Sign with `key`, the sender is the key's public half
    pub fn sign(self, key: &SigningKey) -> Result<SignedTransaction, TxCodecError> {
        let message = self
            .signing_message()
            .ok_or_else(|| TxCodecError::Encode("unserializable transaction".to_string()))?;
        let signature = key.sign(&message);
        Ok(SignedTransaction {
            sender: AccountId::from_public_key(&key.verifying_key()),
            transaction: self,
            signature: Signature64::from(signature.to_bytes()),
        })
    }
}

// =============================================================================
// SIGNED TRANSACTIONS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxCodecError {
    #[error("Empty transaction payload")]
    Empty,

    #[error("Unknown transaction type tag: {0:#04x}")]
    UnknownType(u8),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Transaction type not supported")]
    TxTypeNotSupported,

    #[error("Invalid chain id: expected {expected}, got {got}")]
    InvalidChainId { expected: u64, got: u64 },

    #[error("Replay-protected transaction before replay protection is active")]
    ReplayProtectionInactive,

    #[error("Invalid signature")]
    InvalidSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub sender: AccountId,
    pub transaction: Transaction,
    pub signature: Signature64,
}

impl SignedTransaction {
    pub fn kind(&self) -> TxKind {
        self.transaction.kind()
    }

    pub fn nonce(&self) -> Nonce {
        self.transaction.nonce()
    }

    pub fn gas(&self) -> Gas {
        self.transaction.gas()
    }

    /// Check the signature against the claimed sender
    pub fn verify(&self) -> bool {
        match self.transaction.signing_message() {
            Some(message) => self.sender.verify(&message, self.signature.as_bytes()),
            None => false,
        }
    }

    /// Resolve the sender under the signature rules of a block
    pub fn recover_sender(&self, rules: &SignerRules) -> Result<AccountId, SignerError> {
        if !rules.supports(self.kind()) {
            return Err(SignerError::TxTypeNotSupported);
        }
        if let Some(chain_id) = self.transaction.chain_id() {
            if !rules.replay_protected {
                return Err(SignerError::ReplayProtectionInactive);
            }
            if chain_id != rules.chain_id {
                return Err(SignerError::InvalidChainId {
                    expected: rules.chain_id,
                    got: chain_id,
                });
            }
        }
        if !self.verify() {
            return Err(SignerError::InvalidSignature);
        }
        Ok(self.sender)
    }

    /// Binary encoding: type tag byte followed by bincode(sender, signature, payload)
    pub fn encode_binary(&self) -> Result<Vec<u8>, TxCodecError> {
        let body = match &self.transaction {
            Transaction::Legacy(tx) => bincode::serialize(&(&self.sender, &self.signature, tx)),
            Transaction::AccessList(tx) => {
                bincode::serialize(&(&self.sender, &self.signature, tx))
            }
            Transaction::DynamicFee(tx) => {
                bincode::serialize(&(&self.sender, &self.signature, tx))
            }
        }
        .map_err(|e| TxCodecError::Encode(e.to_string()))?;

        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(self.kind().tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Strict inverse of `encode_binary`: trailing bytes are an error
    pub fn decode_binary(bytes: &[u8]) -> Result<Self, TxCodecError> {
        let (tag, body) = bytes.split_first().ok_or(TxCodecError::Empty)?;
        let kind = TxKind::from_tag(*tag).ok_or(TxCodecError::UnknownType(*tag))?;
        let decode_err = |e: bincode::Error| TxCodecError::Decode(e.to_string());
        let codec = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes();

        let (sender, signature, transaction) = match kind {
            TxKind::Legacy => {
                let (sender, signature, tx): (AccountId, Signature64, LegacyTx) =
                    codec.deserialize(body).map_err(decode_err)?;
                (sender, signature, Transaction::Legacy(tx))
            }
            TxKind::AccessList => {
                let (sender, signature, tx): (AccountId, Signature64, AccessListTx) =
                    codec.deserialize(body).map_err(decode_err)?;
                (sender, signature, Transaction::AccessList(tx))
            }
            TxKind::DynamicFee => {
                let (sender, signature, tx): (AccountId, Signature64, DynamicFeeTx) =
                    codec.deserialize(body).map_err(decode_err)?;
                (sender, signature, Transaction::DynamicFee(tx))
            }
        };

        Ok(Self {
            sender,
            transaction,
            signature,
        })
    }

    /// Canonical encoded size in bytes. Decoding rejects trailing data, so
    /// this equals the wire length of any payload that decoded.
    pub fn size(&self) -> usize {
        self.encode_binary().map(|b| b.len()).unwrap_or(usize::MAX)
    }

    /// Transaction hash (Blake3 of the binary encoding)
    pub fn hash(&self) -> Hash {
        match self.encode_binary() {
            Ok(bytes) => Hash::hash(&bytes),
            Err(_) => {
                // Fallback: hash key fields manually
                let mut data = Vec::new();
                data.push(self.kind().tag());
                data.extend_from_slice(self.sender.as_bytes());
                data.extend_from_slice(&self.nonce().to_le_bytes());
                data.extend_from_slice(self.signature.as_bytes());
                Hash::hash(&data)
            }
        }
    }
}
