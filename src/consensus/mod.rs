// Consensus - Ordering is external, only block sealing lives here
pub mod engine;

pub use engine::{Engine, InstantFinality};
