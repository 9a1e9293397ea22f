// Types RPC - Wire envelopes exchanged with the consensus layer
//
// Every body is bincode over `application/octet-stream`.

use crate::types::{Hash, SignedTransaction, TxCodecError};
use bincode::Options;
use serde::{Deserialize, Serialize};

// =============================================================================
// TRANSACTION ENVELOPE
// =============================================================================

/// Kind of a generic transaction envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// A regular execution-layer transaction
    Normal,
    /// A protocol upgrade carried as a transaction
    Upgrade,
    /// Consensus-internal payload, never executable here
    Consensus,
}

/// Generic envelope around an encoded transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoTransaction {
    pub kind: TransactionType,
    pub payload: Vec<u8>,
}

impl ProtoTransaction {
    /// Wrap a signed transaction as a `Normal` envelope
    pub fn normal(tx: &SignedTransaction) -> Result<Self, TxCodecError> {
        Ok(Self {
            kind: TransactionType::Normal,
            payload: tx.encode_binary()?,
        })
    }

    /// Read an envelope from its bincode encoding, trailing bytes rejected
    pub fn decode(bytes: &[u8]) -> Result<Self, TxCodecError> {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| TxCodecError::Decode(e.to_string()))
    }

    /// Whether the envelope carries something this layer executes
    pub fn is_executable(&self) -> bool {
        matches!(self.kind, TransactionType::Normal | TransactionType::Upgrade)
    }

    pub fn decode_transaction(&self) -> Result<SignedTransaction, TxCodecError> {
        SignedTransaction::decode_binary(&self.payload)
    }
}

// =============================================================================
// OUTBOUND PACKETS (execution -> consensus)
// =============================================================================

/// Client request carried by a packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub tx: ProtoTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketType {
    ClientPacket,
    ConsensusPacket,
}

/// Packet written to the consensus link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Encoded inner message
    pub msg: Vec<u8>,
    pub consensus_id: i64,
    pub epoch: i64,
    pub packet_type: PacketType,
}

impl Packet {
    /// Client packet: not bound to any consensus instance or epoch
    pub fn client(request: &Request) -> Result<Self, bincode::Error> {
        Ok(Self {
            msg: bincode::serialize(request)?,
            consensus_id: -1,
            epoch: -1,
            packet_type: PacketType::ClientPacket,
        })
    }
}

// =============================================================================
// INBOUND CALLS (consensus -> execution)
// =============================================================================

/// Finalized batch, one `ProtoTransaction` encoding per entry, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecBlock {
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBlockResponse {
    /// Set when some entries could not be decoded
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub success: bool,
}

/// Reply to a local submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub hash: Option<Hash>,
    pub error: Option<String>,
}

impl SubmitResult {
    pub fn ok(hash: Hash) -> Self {
        Self {
            hash: Some(hash),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            hash: None,
            error: Some(error.to_string()),
        }
    }
}
