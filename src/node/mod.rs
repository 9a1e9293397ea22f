// Node - Orchestrateur de la couche d'exécution
pub mod builder;
pub mod environment;
pub mod executor;
pub mod handoff;
pub mod interrupt;
pub mod mempool;
pub mod ordering;
pub mod scheduler;
pub mod service;

pub use builder::{BuildError, CandidateBuilder};
pub use environment::{prepare_work, ExecutionEnvironment, GenerateParams, SharedState, WorkContext, WorkError};
pub use executor::{BatchExecutor, ExecutionError, FinalizedBatch};
pub use interrupt::{CancellationToken, InterruptSignal};
pub use mempool::{MempoolConfig, PendingPartition, PoolError, PoolStats, TransactionPool};
pub use ordering::TransactionsByPriceAndNonce;
pub use scheduler::{BuildRequest, RoundScheduler};
pub use service::{Executor, ExecutorConfig, NodeError};
