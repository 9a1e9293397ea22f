// Tests module
// Cross-module scenarios: candidate rounds, batch commit, verification, node lifecycle

pub mod harness;

pub mod candidates;
pub mod pipeline;
