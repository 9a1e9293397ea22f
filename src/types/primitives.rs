// Primitives - Fundamental types for the execution layer
use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash data with Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Full hex representation (Display only shows the first 8 bytes)
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

/// Block number
pub type BlockNumber = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Balances and per-gas prices, in base units
pub type Balance = u128;

/// Gas units
pub type Gas = u64;

/// Per-account transaction sequence number
pub type Nonce = u64;

/// 1 gwei-equivalent, the unit fees are usually quoted in
pub const GWEI: Balance = 1_000_000_000;

/// One whole token (10^18 base units)
pub const ETHER: Balance = 1_000_000_000_000_000_000;

/// Current unix time in seconds
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}
