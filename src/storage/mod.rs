// Storage - Couche de persistance (RocksDB + état journalisé)
// Principe: Auditabilité, Reproductibilité

pub mod chain;
pub mod db;
pub mod state;

pub use chain::*;
pub use db::*;
pub use state::*;
