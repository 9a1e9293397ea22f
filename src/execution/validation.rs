// Validation - Stateless admission checks for transactions
use super::gas::{intrinsic_gas, GasError};
use crate::types::{Balance, Gas, Header, SignedTransaction, SignerError, SignerRules, TxCodecError, TxKind};
use std::collections::BTreeSet;

/// Default maximum encoded transaction size (128 KiB)
pub const TX_MAX_SIZE: usize = 4 * 32 * 1024;

/// Which transactions a node admits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Accepted transaction kinds
    pub accept: BTreeSet<TxKind>,

    /// Maximum encoded size in bytes
    pub max_size: usize,

    /// Minimum tip per gas
    pub min_tip: Balance,
}

impl ValidationPolicy {
    /// Accepts every kind with the default size limit
    pub fn new(min_tip: Balance) -> Self {
        Self {
            accept: TxKind::ALL.into_iter().collect(),
            max_size: TX_MAX_SIZE,
            min_tip,
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Transaction type {0} not accepted")]
    TypeNotAccepted(TxKind),

    #[error("Transaction type {0} not supported by the current rules")]
    TypeNotSupported(TxKind),

    #[error("Oversized data: {size} > {max}")]
    OversizedData { size: usize, max: usize },

    #[error("Exceeds block gas limit: {gas} > {limit}")]
    GasLimit { gas: Gas, limit: Gas },

    #[error("Max priority fee higher than max fee")]
    TipAboveFeeCap,

    #[error("Nonce has max value")]
    NonceMax,

    #[error("Invalid sender: {0}")]
    InvalidSender(#[from] SignerError),

    #[error("Only replay-protected transactions allowed")]
    Unprotected,

    #[error("Intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas { have: Gas, want: Gas },

    #[error("Intrinsic gas: {0}")]
    IntrinsicGasOverflow(#[from] GasError),

    #[error("Transaction underpriced: tip {tip} < minimum {min}")]
    Underpriced { tip: Balance, min: Balance },

    #[error("Envelope does not carry an executable transaction")]
    NotExecutable,

    #[error("Malformed transaction: {0}")]
    Malformed(#[from] TxCodecError),

    #[error("No committed baseline to validate against")]
    NoBaseline,
}

/// Result of [`validate_transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(ValidationError),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

impl From<Result<(), ValidationError>> for ValidationOutcome {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => ValidationOutcome::Accepted,
            Err(e) => ValidationOutcome::Rejected(e),
        }
    }
}

/// Check a transaction against a header and signer rules, without state.
/// Deterministic for identical inputs.
pub fn validate_transaction(
    tx: &SignedTransaction,
    header: &Header,
    signer: &SignerRules,
    policy: &ValidationPolicy,
) -> ValidationOutcome {
    check_transaction(tx, header, signer, policy).into()
}

fn check_transaction(
    tx: &SignedTransaction,
    header: &Header,
    signer: &SignerRules,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    let kind = tx.kind();
    if !policy.accept.contains(&kind) {
        return Err(ValidationError::TypeNotAccepted(kind));
    }

    let size = tx.size();
    if size > policy.max_size {
        return Err(ValidationError::OversizedData {
            size,
            max: policy.max_size,
        });
    }

    if !signer.supports(kind) {
        return Err(ValidationError::TypeNotSupported(kind));
    }

    let inner = &tx.transaction;
    if inner.gas() > header.gas_limit {
        return Err(ValidationError::GasLimit {
            gas: inner.gas(),
            limit: header.gas_limit,
        });
    }

    if inner.gas_fee_cap() < inner.gas_tip_cap() {
        return Err(ValidationError::TipAboveFeeCap);
    }

    if inner.nonce() == u64::MAX {
        return Err(ValidationError::NonceMax);
    }

    tx.recover_sender(signer)?;

    if !inner.protected() && signer.require_replay_protection {
        return Err(ValidationError::Unprotected);
    }

    let want = intrinsic_gas(inner)?;
    if inner.gas() < want {
        return Err(ValidationError::IntrinsicGas {
            have: inner.gas(),
            want,
        });
    }

    // Tip as declared, independent of the base fee
    let tip = inner.gas_tip_cap();
    if tip < policy.min_tip {
        return Err(ValidationError::Underpriced {
            tip,
            min: policy.min_tip,
        });
    }

    Ok(())
}
