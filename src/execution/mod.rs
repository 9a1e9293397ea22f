// Execution - Deterministic state machine
// Principle: value transfers only, every rule stateless or journaled

pub mod fees;
pub mod gas;
pub mod state_transition;
pub mod validation;

pub use fees::calc_base_fee;
pub use gas::{calc_gas_limit, intrinsic_gas, GasError, GasPool, TX_GAS};
pub use state_transition::{apply_transaction, ApplyError};
pub use validation::{validate_transaction, ValidationError, ValidationOutcome, ValidationPolicy};
