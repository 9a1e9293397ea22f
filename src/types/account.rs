// Account - Minimal account model
use super::primitives::{Balance, Hash, Nonce};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// AccountId = Ed25519 public key (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// The zero address, used as "no coinbase configured"
    pub const ZERO: AccountId = AccountId([0u8; 32]);

    pub fn from_public_key(key: &VerifyingKey) -> Self {
        AccountId(key.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Address of an account created by `creator` at `nonce`
    pub fn derive_created(creator: &AccountId, nonce: Nonce) -> Self {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(creator.as_bytes());
        data.extend_from_slice(&nonce.to_le_bytes());
        AccountId(*Hash::hash(&data).as_bytes())
    }

    /// Verify a signature made by this account
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let public_key = match VerifyingKey::from_bytes(&self.0) {
            Ok(pk) => pk,
            Err(_) => return false,
        };

        let sig = Signature::from_bytes(signature);

        public_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }
}

impl FromStr for AccountId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(hex_str).map_err(|e| format!("Invalid hex: {}", e))?;
        if bytes.len() != 32 {
            return Err(format!("Invalid account length: {} bytes", bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(AccountId(arr))
    }
}

/// Account state in the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Next expected transaction nonce
    pub nonce: Nonce,

    /// Spendable balance
    pub balance: Balance,
}

impl AccountInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(balance: Balance) -> Self {
        Self { nonce: 0, balance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_parse_roundtrip() {
        let id = AccountId::from_bytes([7; 32]);
        let parsed: AccountId = format!("0x{}", hex::encode(id.as_bytes())).parse().unwrap();
        assert_eq!(parsed, id);
        assert!("0x1234".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_derive_created_depends_on_nonce() {
        let creator = AccountId::from_bytes([1; 32]);
        assert_ne!(
            AccountId::derive_created(&creator, 0),
            AccountId::derive_created(&creator, 1)
        );
    }
}
