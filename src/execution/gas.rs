// Gas - Block gas pool, gas-limit drift and intrinsic gas
use crate::types::{Gas, Transaction};

/// Gas of a plain value transfer, the cheapest possible transaction
pub const TX_GAS: Gas = 21_000;

/// Gas of a transaction that creates an account
pub const TX_GAS_CONTRACT_CREATION: Gas = 53_000;

/// Coûts en gas par octet de données
pub const TX_DATA_ZERO_GAS: Gas = 4;
pub const TX_DATA_NON_ZERO_GAS: Gas = 16;

/// Coûts en gas de la liste d'accès
pub const TX_ACCESS_LIST_ADDRESS_GAS: Gas = 2_400;
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: Gas = 1_900;

/// Minimum the gas limit may ever be
pub const MIN_GAS_LIMIT: Gas = 5_000;

/// Bound divisor of the gas limit, used in update calculations
pub const GAS_LIMIT_BOUND_DIVISOR: Gas = 1_024;

/// Default ceiling a producer steers the block gas limit towards
pub const DEFAULT_GAS_CEIL: Gas = 30_000_000;

/// Gas still available to transactions of the block being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasPool(Gas);

impl GasPool {
    pub fn new(gas: Gas) -> Self {
        Self(gas)
    }

    /// Rend du gas au pool
    pub fn add_gas(&mut self, amount: Gas) -> Result<(), GasError> {
        self.0 = self.0.checked_add(amount).ok_or(GasError::Overflow)?;
        Ok(())
    }

    /// Consomme du gas. Le pool n'est pas modifié en cas d'erreur.
    pub fn sub_gas(&mut self, amount: Gas) -> Result<(), GasError> {
        if self.0 < amount {
            return Err(GasError::GasLimitReached {
                needed: amount,
                remaining: self.0,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Gas restant
    pub fn gas(&self) -> Gas {
        self.0
    }

    pub fn set_gas(&mut self, gas: Gas) {
        self.0 = gas;
    }
}

/// Gas limit of the child block: moves from the parent's limit towards
/// `desired` by at most `parent / 1024 - 1`, and never below the minimum.
pub fn calc_gas_limit(parent_gas_limit: Gas, desired: Gas) -> Gas {
    let delta = (parent_gas_limit / GAS_LIMIT_BOUND_DIVISOR).saturating_sub(1);
    let desired = desired.max(MIN_GAS_LIMIT);

    if parent_gas_limit < desired {
        return parent_gas_limit.saturating_add(delta).min(desired);
    }
    if parent_gas_limit > desired {
        return parent_gas_limit.saturating_sub(delta).max(desired);
    }
    parent_gas_limit
}

/// Gas charged before any execution: base cost, data bytes and access list
pub fn intrinsic_gas(tx: &Transaction) -> Result<Gas, GasError> {
    let mut gas = if tx.to().is_none() {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };

    let data = tx.data();
    let zeros = data.iter().filter(|b| **b == 0).count() as Gas;
    let non_zeros = data.len() as Gas - zeros;

    let data_gas = non_zeros
        .checked_mul(TX_DATA_NON_ZERO_GAS)
        .and_then(|g| g.checked_add(zeros.checked_mul(TX_DATA_ZERO_GAS)?))
        .ok_or(GasError::Overflow)?;
    gas = gas.checked_add(data_gas).ok_or(GasError::Overflow)?;

    let access_list = tx.access_list();
    let keys: usize = access_list.iter().map(|t| t.storage_keys.len()).sum();
    let access_gas = (access_list.len() as Gas)
        .checked_mul(TX_ACCESS_LIST_ADDRESS_GAS)
        .and_then(|g| g.checked_add((keys as Gas).checked_mul(TX_ACCESS_LIST_STORAGE_KEY_GAS)?))
        .ok_or(GasError::Overflow)?;
    gas = gas.checked_add(access_gas).ok_or(GasError::Overflow)?;

    Ok(gas)
}

/// Erreurs de gas
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GasError {
    #[error("Gas limit reached: needed {needed}, remaining {remaining}")]
    GasLimitReached { needed: Gas, remaining: Gas },

    #[error("Overflow dans le calcul de gas")]
    Overflow,
}
