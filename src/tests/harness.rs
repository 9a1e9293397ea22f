// Harness - Shared fixtures for the cross-module scenarios
//
// A temporary chain, a pool and gateway wired like the executor wires them,
// and an in-memory consensus link that records what it is sent.

use crate::consensus::InstantFinality;
use crate::execution::validation::ValidationPolicy;
use crate::genesis::{dev_signing_key, GenesisAccount, GenesisSpec, DEV_CHAIN_ID};
use crate::node::environment::{ExecutionEnvironment, SharedHandle, SharedState, WorkContext};
use crate::node::executor::{BatchExecutor, FinalizedBatch};
use crate::node::handoff::{handoff, HandoffReceiver};
use crate::node::mempool::{MempoolConfig, PoolError, TransactionPool};
use crate::node::{CancellationToken, CandidateBuilder, InterruptSignal};
use crate::rpc::client::{ConsensusLink, LinkError};
use crate::rpc::gateway::ConsensusGateway;
use crate::rpc::types::{Packet, ProtoTransaction, Request};
use crate::storage::{ChainDb, ChainStore, Database};
use crate::types::*;
use ed25519_dalek::SigningKey;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, RwLock};

// =============================================================================
// RECORDING LINK
// =============================================================================

/// Consensus link that keeps every packet and can be told to fail
#[derive(Default)]
pub struct RecordingLink {
    packets: Mutex<Vec<Packet>>,
    failing: Mutex<HashSet<Hash>>,
    interrupt: Mutex<Option<(usize, CancellationToken, InterruptSignal)>>,
}

impl RecordingLink {
    /// Refuse the packet carrying `hash`
    pub fn fail_on(&self, hash: Hash) {
        self.failing.lock().unwrap().insert(hash);
    }

    /// Signal `token` once `after` packets were accepted
    pub fn interrupt_after(
        &self,
        after: usize,
        token: CancellationToken,
        signal: InterruptSignal,
    ) {
        *self.interrupt.lock().unwrap() = Some((after, token, signal));
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.packets.lock().unwrap().clone()
    }

    /// Transactions carried by the accepted packets, in send order
    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.packets()
            .iter()
            .map(|packet| {
                let request: Request = bincode::deserialize(&packet.msg).unwrap();
                request.tx.decode_transaction().unwrap()
            })
            .collect()
    }

    pub fn sent_hashes(&self) -> Vec<Hash> {
        self.sent().iter().map(SignedTransaction::hash).collect()
    }

    fn record(&self, packet: Packet) -> Result<(), LinkError> {
        let request: Request =
            bincode::deserialize(&packet.msg).map_err(|e| LinkError::Serialization(e.to_string()))?;
        let hash = request
            .tx
            .decode_transaction()
            .map_err(|e| LinkError::Serialization(e.to_string()))?
            .hash();
        if self.failing.lock().unwrap().contains(&hash) {
            return Err(LinkError::Status(503));
        }

        let mut packets = self.packets.lock().unwrap();
        packets.push(packet);
        if let Some((after, token, signal)) = self.interrupt.lock().unwrap().as_ref() {
            if packets.len() >= *after {
                token.signal(*signal);
            }
        }
        Ok(())
    }
}

impl ConsensusLink for RecordingLink {
    fn send_packet(&self, packet: Packet) -> BoxFuture<'_, Result<(), LinkError>> {
        let result = self.record(packet);
        async move { result }.boxed()
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

pub fn account(key: &SigningKey) -> AccountId {
    AccountId::from_public_key(&key.verifying_key())
}

pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Replay-protected value transfer
pub fn transfer(key: &SigningKey, nonce: Nonce, gas_price: Balance, gas: Gas) -> SignedTransaction {
    Transaction::Legacy(LegacyTx {
        chain_id: Some(DEV_CHAIN_ID),
        nonce,
        gas_price,
        gas,
        to: Some(AccountId::from_bytes([0xee; 32])),
        value: 1_000,
        data: vec![],
    })
    .sign(key)
    .unwrap()
}

pub fn envelope(tx: &SignedTransaction) -> Vec<u8> {
    bincode::serialize(&ProtoTransaction::normal(tx).unwrap()).unwrap()
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct Harness {
    _dir: TempDir,
    pub chain: Arc<dyn ChainStore>,
    pub rules: ChainRules,
    pub shared: SharedHandle,
    pub running: Arc<AtomicBool>,
    pub pool: Arc<RwLock<TransactionPool>>,
    pub link: Arc<RecordingLink>,
    pub gateway: ConsensusGateway,
    batches: Option<HandoffReceiver<FinalizedBatch>>,
    shutdown: broadcast::Sender<()>,
}

impl Harness {
    /// Dev chain with the dev account and `extra` keys funded
    pub fn new(gas_limit: Gas, policy: ValidationPolicy, extra: &[&SigningKey]) -> Self {
        let dir = TempDir::new().unwrap();
        let mut genesis = GenesisSpec {
            gas_limit,
            ..GenesisSpec::dev()
        };
        for key in extra {
            genesis.alloc.push(GenesisAccount {
                account: account(key),
                balance: 1_000 * ETHER,
            });
        }

        let chain = ChainDb::open(Database::open(dir.path()).unwrap(), &genesis).unwrap();
        let chain: Arc<dyn ChainStore> = Arc::new(chain);
        let rules = ChainRules::dev(DEV_CHAIN_ID);

        let head = chain.current_header().unwrap();
        let state = chain.state_at(&head.state_root).unwrap();
        let signer = rules.signer_rules(head.number, head.timestamp);
        let mut pool = TransactionPool::new(MempoolConfig {
            policy: policy.clone(),
            ..Default::default()
        });
        pool.reset(&state);
        let pool = Arc::new(RwLock::new(pool));

        let coinbase = account(&dev_signing_key());
        let shared: SharedHandle = Arc::new(RwLock::new(SharedState {
            coinbase,
            env: Some(Arc::new(ExecutionEnvironment::new(signer, state, coinbase, head))),
        }));

        let link = Arc::new(RecordingLink::default());
        let (batch_tx, batch_rx) = handoff();
        let gateway = ConsensusGateway::new(link.clone(), batch_tx, shared.clone(), pool.clone(), policy);
        let (shutdown, _) = broadcast::channel(1);

        Self {
            _dir: dir,
            chain,
            rules,
            shared,
            running: Arc::new(AtomicBool::new(false)),
            pool,
            link,
            gateway,
            batches: Some(batch_rx),
            shutdown,
        }
    }

    pub fn dev(gas_limit: Gas) -> Self {
        Self::new(gas_limit, ValidationPolicy::default(), &[])
    }

    pub fn work(&self) -> WorkContext {
        WorkContext {
            chain: self.chain.clone(),
            rules: self.rules.clone(),
            gas_ceil: self.chain.current_header().unwrap().gas_limit,
            shared: self.shared.clone(),
            running: self.running.clone(),
        }
    }

    pub fn builder(&self) -> CandidateBuilder {
        CandidateBuilder::new(self.work(), self.pool.clone(), self.gateway.clone())
    }

    pub fn batch_executor(&self) -> BatchExecutor {
        BatchExecutor::new(self.work(), Arc::new(InstantFinality), self.pool.clone())
    }

    /// Run the batch executor loop behind the gateway
    pub fn spawn_executor(&mut self) {
        let batches = self.batches.take().expect("executor already spawned");
        tokio::spawn(self.batch_executor().run(batches, self.shutdown.subscribe()));
    }

    pub async fn add_remote(&self, tx: SignedTransaction) -> Result<Hash, PoolError> {
        let env = self.shared.read().await.env.clone().unwrap();
        self.pool
            .write()
            .await
            .add_remote(tx, &env.header, &env.signer, &env.state)
    }

    pub async fn add_local(&self, tx: SignedTransaction) -> Result<Hash, PoolError> {
        let env = self.shared.read().await.env.clone().unwrap();
        self.pool
            .write()
            .await
            .add_local(tx, &env.header, &env.signer, &env.state)
    }

    /// Drop the executor end of the hand-off
    pub fn close_executor(&mut self) {
        self.batches.take();
    }

    /// Poll until a block at `number` or above is published as baseline
    pub async fn wait_for_baseline(&self, number: BlockNumber) -> Header {
        for _ in 0..500 {
            if let Some(env) = self.shared.read().await.env.as_ref() {
                if env.header.number >= number {
                    return env.header.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("baseline never reached #{}", number);
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}
