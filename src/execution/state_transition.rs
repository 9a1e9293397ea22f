// State transition - Apply one transaction to the world state
use super::gas::{intrinsic_gas, GasError, GasPool};
use crate::storage::state::{StateDb, StateError};
use crate::types::{
    AccountId, Balance, ChainRules, Gas, Hash, Header, Log, Nonce, Receipt, ReceiptStatus,
    SignedTransaction, SignerError,
};
use tracing::trace;

/// Topic of the log emitted for value transfers
pub fn transfer_topic() -> Hash {
    Hash::hash(b"Transfer(address,address,uint256)")
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Invalid sender: {0}")]
    InvalidSender(#[from] SignerError),

    #[error("Nonce too low: account {account}, state {state}, tx {tx}")]
    NonceTooLow {
        account: AccountId,
        state: Nonce,
        tx: Nonce,
    },

    #[error("Nonce too high: account {account}, state {state}, tx {tx}")]
    NonceTooHigh {
        account: AccountId,
        state: Nonce,
        tx: Nonce,
    },

    #[error("Nonce has max value: account {0}")]
    NonceMax(AccountId),

    #[error("Max fee per gas less than block base fee: {fee_cap} < {base_fee}")]
    FeeCapTooLow { fee_cap: Balance, base_fee: Balance },

    #[error("Insufficient funds for gas * price + value: have {have}, want {want}")]
    InsufficientFunds { have: Balance, want: Balance },

    #[error("Block gas: {0}")]
    Gas(#[from] GasError),

    #[error("Intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas { have: Gas, want: Gas },

    #[error("State: {0}")]
    State(#[from] StateError),
}

/// Apply `tx` on top of `state` in the block described by `header`.
///
/// On success the header's gas used is advanced and a receipt is returned
/// (block hash left blank). On error the state and gas pool may be partially
/// modified, callers are expected to revert to a snapshot.
pub fn apply_transaction(
    rules: &ChainRules,
    state: &mut StateDb,
    header: &mut Header,
    gas_pool: &mut GasPool,
    coinbase: &AccountId,
    tx: &SignedTransaction,
) -> Result<Receipt, ApplyError> {
    let signer = rules.signer_rules(header.number, header.timestamp);
    let sender = tx.recover_sender(&signer)?;
    let inner = &tx.transaction;

    // Nonce
    let state_nonce = state.nonce(&sender);
    if inner.nonce() < state_nonce {
        return Err(ApplyError::NonceTooLow {
            account: sender,
            state: state_nonce,
            tx: inner.nonce(),
        });
    }
    if inner.nonce() > state_nonce {
        return Err(ApplyError::NonceTooHigh {
            account: sender,
            state: state_nonce,
            tx: inner.nonce(),
        });
    }
    if state_nonce == Nonce::MAX {
        return Err(ApplyError::NonceMax(sender));
    }

    // Fee cap must cover the base fee
    if let Some(base_fee) = header.base_fee {
        if inner.gas_fee_cap() < base_fee {
            return Err(ApplyError::FeeCapTooLow {
                fee_cap: inner.gas_fee_cap(),
                base_fee,
            });
        }
    }

    // Buy gas: the worst case must be affordable, the effective price is charged
    let have = state.balance(&sender);
    let want = inner.cost();
    if have < want {
        return Err(ApplyError::InsufficientFunds { have, want });
    }
    let gas_price = inner.effective_gas_price(header.base_fee);
    let gas_limit = inner.gas();
    gas_pool.sub_gas(gas_limit)?;
    state.sub_balance(&sender, (gas_limit as Balance).saturating_mul(gas_price))?;

    let intrinsic = intrinsic_gas(inner)?;
    if gas_limit < intrinsic {
        return Err(ApplyError::IntrinsicGas {
            have: gas_limit,
            want: intrinsic,
        });
    }
    let gas_used = intrinsic;

    // Execute: account creation or value transfer
    let value = inner.value();
    let (recipient, contract_address) = match inner.to() {
        Some(to) => (to, None),
        None => {
            let created = AccountId::derive_created(&sender, state_nonce);
            state.create_account(&created);
            (created, Some(created))
        }
    };
    state.set_nonce(&sender, state_nonce + 1);
    if value > 0 {
        state.transfer(&sender, &recipient, value)?;
        state.add_log(Log {
            address: sender,
            topics: vec![
                transfer_topic(),
                Hash::from_bytes(*sender.as_bytes()),
                Hash::from_bytes(*recipient.as_bytes()),
            ],
            data: value.to_be_bytes().to_vec(),
            ..Default::default()
        });
    }

    // Refund unused gas, then pay the tip
    let remaining = gas_limit - gas_used;
    state.add_balance(&sender, (remaining as Balance).saturating_mul(gas_price))?;
    gas_pool.add_gas(remaining)?;

    let tip = inner.effective_tip(header.base_fee).unwrap_or(0);
    state.add_balance(coinbase, (gas_used as Balance).saturating_mul(tip))?;

    header.gas_used = header.gas_used.saturating_add(gas_used);

    let tx_hash = tx.hash();
    trace!("Applied tx {} from {} ({} gas)", tx_hash, sender, gas_used);

    Ok(Receipt {
        kind: tx.kind(),
        status: ReceiptStatus::Successful,
        cumulative_gas_used: header.gas_used,
        gas_used,
        tx_hash,
        contract_address,
        logs: state.tx_logs(&tx_hash),
        block_hash: Hash::ZERO,
        block_number: header.number,
        tx_index: 0,
    })
}
