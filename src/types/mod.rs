// Types fondamentaux de la couche d'exécution KratOs
// Principe: Minimal, auditable, durable

pub mod primitives;
pub mod signature;
pub mod account;
pub mod transaction;
pub mod block;
pub mod chain;
pub mod merkle;

pub use primitives::*;
pub use signature::*;
pub use account::*;
pub use transaction::*;
pub use block::*;
pub use chain::*;
pub use merkle::*;
