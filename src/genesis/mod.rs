// Genesis - Configuration et bloc genesis
pub mod config;
pub mod spec;

pub use config::{ChainSpec, DEV_CHAIN_ID};
pub use spec::{dev_signing_key, GenesisAccount, GenesisBuilder, GenesisSpec};
