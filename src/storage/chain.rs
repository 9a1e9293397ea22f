// Chain - Durable chain store (blocks, receipts, states, head)
use super::db::{Database, DatabaseError, WriteOp};
use super::state::StateDb;
use crate::genesis::{GenesisBuilder, GenesisSpec};
use crate::types::{AccountId, AccountInfo, Block, BlockNumber, Hash, Header, Log, Receipt};
use tracing::info;

/// Storage key prefixes
const PREFIX_HEADER: &[u8] = b"header:";
const PREFIX_BLOCK: &[u8] = b"block:";
const PREFIX_CANONICAL: &[u8] = b"canonical:";
const PREFIX_RECEIPTS: &[u8] = b"receipts:";
const PREFIX_LOGS: &[u8] = b"logs:";
const PREFIX_STATE: &[u8] = b"state:";
const KEY_HEAD: &[u8] = b"head";
const KEY_GENESIS_HASH: &[u8] = b"genesis_hash";

fn key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// Read/append access to the canonical chain
pub trait ChainStore: Send + Sync {
    /// Header of the canonical head
    fn current_header(&self) -> Result<Header, ChainError>;

    fn header_by_hash(&self, hash: &Hash) -> Result<Option<Header>, ChainError>;

    fn block_by_number(&self, number: BlockNumber) -> Result<Option<Block>, ChainError>;

    fn receipts_by_hash(&self, hash: &Hash) -> Result<Option<Vec<Receipt>>, ChainError>;

    /// Open the world state committed under `root`
    fn state_at(&self, root: &Hash) -> Result<StateDb, ChainError>;

    /// Persist a block with its receipts, logs and post-state, then make it the head
    fn write_block_and_set_head(
        &self,
        block: &Block,
        receipts: &[Receipt],
        logs: &[Log],
        state: &StateDb,
    ) -> Result<(), ChainError>;
}

/// RocksDB-backed chain store
#[derive(Clone)]
pub struct ChainDb {
    db: Database,
}

impl ChainDb {
    /// Open the chain, writing the genesis block on first use
    pub fn open(db: Database, genesis: &GenesisSpec) -> Result<Self, ChainError> {
        let chain = Self { db };
        let (block, state) = GenesisBuilder::new(genesis).build();
        let genesis_hash = block.hash();

        match chain.db.get_typed::<Hash>(KEY_GENESIS_HASH)? {
            Some(stored) if stored != genesis_hash => {
                return Err(ChainError::GenesisMismatch {
                    stored,
                    expected: genesis_hash,
                });
            }
            Some(_) => {
                let head = chain.current_header()?;
                info!("📦 Chain opened at #{} ({})", head.number, head.hash());
            }
            None => {
                let mut ops = chain.block_ops(&block, &[], &[], &state)?;
                ops.push(WriteOp::put_typed(KEY_GENESIS_HASH.to_vec(), &genesis_hash)?);
                chain.db.batch_write(ops)?;
                info!("🌱 Genesis block written: {}", genesis_hash);
            }
        }

        Ok(chain)
    }

    pub fn genesis_hash(&self) -> Result<Option<Hash>, ChainError> {
        Ok(self.db.get_typed(KEY_GENESIS_HASH)?)
    }

    fn block_ops(
        &self,
        block: &Block,
        receipts: &[Receipt],
        logs: &[Log],
        state: &StateDb,
    ) -> Result<Vec<WriteOp>, ChainError> {
        let hash = block.hash();
        let accounts: Vec<(AccountId, AccountInfo)> = state
            .accounts()
            .map(|(id, info)| (*id, info.clone()))
            .collect();

        Ok(vec![
            WriteOp::put_typed(key(PREFIX_HEADER, hash.as_bytes()), &block.header)?,
            WriteOp::put_typed(key(PREFIX_BLOCK, hash.as_bytes()), block)?,
            WriteOp::put_typed(
                key(PREFIX_CANONICAL, &block.number().to_be_bytes()),
                &hash,
            )?,
            WriteOp::put_typed(key(PREFIX_RECEIPTS, hash.as_bytes()), &receipts)?,
            WriteOp::put_typed(key(PREFIX_LOGS, hash.as_bytes()), &logs)?,
            WriteOp::put_typed(
                key(PREFIX_STATE, block.header.state_root.as_bytes()),
                &accounts,
            )?,
            WriteOp::put_typed(KEY_HEAD.to_vec(), &hash)?,
        ])
    }

    /// Logs stored with a block
    pub fn logs_by_hash(&self, hash: &Hash) -> Result<Option<Vec<Log>>, ChainError> {
        Ok(self.db.get_typed(&key(PREFIX_LOGS, hash.as_bytes()))?)
    }
}

impl ChainStore for ChainDb {
    fn current_header(&self) -> Result<Header, ChainError> {
        let head: Hash = self.db.get_typed(KEY_HEAD)?.ok_or(ChainError::NoHead)?;
        self.header_by_hash(&head)?.ok_or(ChainError::UnknownBlock(head))
    }

    fn header_by_hash(&self, hash: &Hash) -> Result<Option<Header>, ChainError> {
        Ok(self.db.get_typed(&key(PREFIX_HEADER, hash.as_bytes()))?)
    }

    fn block_by_number(&self, number: BlockNumber) -> Result<Option<Block>, ChainError> {
        let hash: Option<Hash> = self
            .db
            .get_typed(&key(PREFIX_CANONICAL, &number.to_be_bytes()))?;
        match hash {
            Some(hash) => Ok(self.db.get_typed(&key(PREFIX_BLOCK, hash.as_bytes()))?),
            None => Ok(None),
        }
    }

    fn receipts_by_hash(&self, hash: &Hash) -> Result<Option<Vec<Receipt>>, ChainError> {
        Ok(self.db.get_typed(&key(PREFIX_RECEIPTS, hash.as_bytes()))?)
    }

    fn state_at(&self, root: &Hash) -> Result<StateDb, ChainError> {
        let accounts: Vec<(AccountId, AccountInfo)> = self
            .db
            .get_typed(&key(PREFIX_STATE, root.as_bytes()))?
            .ok_or(ChainError::StateNotFound(*root))?;
        Ok(StateDb::from_accounts(accounts))
    }

    fn write_block_and_set_head(
        &self,
        block: &Block,
        receipts: &[Receipt],
        logs: &[Log],
        state: &StateDb,
    ) -> Result<(), ChainError> {
        let parent = block.header.parent_hash;
        if self.header_by_hash(&parent)?.is_none() {
            return Err(ChainError::UnknownParent(parent));
        }

        let computed = state.root();
        if computed != block.header.state_root {
            return Err(ChainError::StateRootMismatch {
                expected: block.header.state_root,
                computed,
            });
        }

        let ops = self.block_ops(block, receipts, logs, state)?;
        self.db.batch_write(ops)?;
        Ok(())
    }
}

/// Erreurs de la chaîne
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Erreur de base de données: {0}")]
    Database(#[from] DatabaseError),

    #[error("No chain head")]
    NoHead,

    #[error("Unknown block {0}")]
    UnknownBlock(Hash),

    #[error("Unknown parent block {0}")]
    UnknownParent(Hash),

    #[error("Missing state for root {0}")]
    StateNotFound(Hash),

    #[error("State root mismatch: header {expected}, computed {computed}")]
    StateRootMismatch { expected: Hash, computed: Hash },

    #[error("Genesis mismatch: stored {stored}, configured {expected}")]
    GenesisMismatch { stored: Hash, expected: Hash },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> ChainDb {
        ChainDb::open(Database::open(dir.path()).unwrap(), &GenesisSpec::dev()).unwrap()
    }

    fn child(parent: &Header, state: &StateDb) -> Block {
        Block::new(
            Header {
                parent_hash: parent.hash(),
                number: parent.number + 1,
                gas_limit: parent.gas_limit,
                timestamp: parent.timestamp + 1,
                state_root: state.root(),
                ..Default::default()
            },
            vec![],
        )
    }

    #[test]
    fn test_genesis_initialized_once() {
        let dir = TempDir::new().unwrap();
        let chain = open(&dir);
        let head = chain.current_header().unwrap();
        assert_eq!(head.number, 0);
        assert_eq!(chain.genesis_hash().unwrap(), Some(head.hash()));
        drop(chain);

        // Reopening keeps the same genesis
        let chain = open(&dir);
        assert_eq!(chain.current_header().unwrap(), head);
    }

    #[test]
    fn test_genesis_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        drop(open(&dir));

        let mut other = GenesisSpec::dev();
        other.timestamp += 1;
        let result = ChainDb::open(Database::open(dir.path()).unwrap(), &other);
        assert!(matches!(result, Err(ChainError::GenesisMismatch { .. })));
    }

    #[test]
    fn test_write_block_and_set_head() {
        let dir = TempDir::new().unwrap();
        let chain = open(&dir);
        let genesis = chain.current_header().unwrap();

        let mut state = chain.state_at(&genesis.state_root).unwrap();
        state.add_balance(&AccountId::from_bytes([5; 32]), 99).unwrap();
        let block = child(&genesis, &state);

        chain.write_block_and_set_head(&block, &[], &[], &state).unwrap();

        assert_eq!(chain.current_header().unwrap(), block.header);
        assert_eq!(chain.block_by_number(1).unwrap(), Some(block.clone()));
        assert_eq!(chain.receipts_by_hash(&block.hash()).unwrap(), Some(vec![]));
        let reopened = chain.state_at(&block.header.state_root).unwrap();
        assert_eq!(reopened.balance(&AccountId::from_bytes([5; 32])), 99);
    }

    #[test]
    fn test_write_rejects_unknown_parent_and_bad_root() {
        let dir = TempDir::new().unwrap();
        let chain = open(&dir);
        let genesis = chain.current_header().unwrap();
        let state = chain.state_at(&genesis.state_root).unwrap();

        let mut orphan = child(&genesis, &state);
        orphan.header.parent_hash = Hash::hash(b"nowhere");
        assert!(matches!(
            chain.write_block_and_set_head(&orphan, &[], &[], &state),
            Err(ChainError::UnknownParent(_))
        ));

        let mut bad_root = child(&genesis, &state);
        bad_root.header.state_root = Hash::hash(b"wrong");
        assert!(matches!(
            chain.write_block_and_set_head(&bad_root, &[], &[], &state),
            Err(ChainError::StateRootMismatch { .. })
        ));
        assert_eq!(chain.current_header().unwrap(), genesis);
    }

    #[test]
    fn test_missing_state() {
        let dir = TempDir::new().unwrap();
        let chain = open(&dir);
        assert!(matches!(
            chain.state_at(&Hash::hash(b"missing")),
            Err(ChainError::StateNotFound(_))
        ));
    }
}
