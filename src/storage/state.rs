// State - Journaled world state
use crate::types::{merkle_root, AccountId, AccountInfo, Balance, Hash, Log, Nonce};
use std::collections::BTreeMap;

/// Undo record for one mutation
#[derive(Debug, Clone)]
enum JournalEntry {
    Account {
        id: AccountId,
        previous: Option<AccountInfo>,
    },
}

/// Revision marker returned by [`StateDb::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    journal_len: usize,
    logs_len: usize,
}

/// In-memory world state opened at some state root.
///
/// Every mutation is journaled so that a failed transaction can be undone
/// with `revert_to_snapshot`. `Clone` is a deep copy.
#[derive(Debug, Clone, Default)]
pub struct StateDb {
    accounts: BTreeMap<AccountId, AccountInfo>,
    journal: Vec<JournalEntry>,

    /// Logs emitted in the current block, in emission order
    logs: Vec<Log>,

    tx_hash: Hash,
    tx_index: u32,
}

impl StateDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a state over a set of accounts (no pending journal)
    pub fn from_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (AccountId, AccountInfo)>,
    {
        Self {
            accounts: accounts.into_iter().collect(),
            ..Default::default()
        }
    }

    /// All accounts, ordered by id
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountInfo)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn exists(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Account info, or an empty account if it does not exist
    pub fn account(&self, id: &AccountId) -> AccountInfo {
        self.accounts.get(id).cloned().unwrap_or_default()
    }

    pub fn balance(&self, id: &AccountId) -> Balance {
        self.accounts.get(id).map(|a| a.balance).unwrap_or(0)
    }

    pub fn nonce(&self, id: &AccountId) -> Nonce {
        self.accounts.get(id).map(|a| a.nonce).unwrap_or(0)
    }

    fn write(&mut self, id: AccountId, info: AccountInfo) {
        let previous = self.accounts.insert(id, info);
        self.journal.push(JournalEntry::Account { id, previous });
    }

    pub fn set_nonce(&mut self, id: &AccountId, nonce: Nonce) {
        let mut info = self.account(id);
        info.nonce = nonce;
        self.write(*id, info);
    }

    pub fn add_balance(&mut self, id: &AccountId, amount: Balance) -> Result<(), StateError> {
        let mut info = self.account(id);
        info.balance = info
            .balance
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow(*id))?;
        self.write(*id, info);
        Ok(())
    }

    pub fn sub_balance(&mut self, id: &AccountId, amount: Balance) -> Result<(), StateError> {
        let mut info = self.account(id);
        if info.balance < amount {
            return Err(StateError::InsufficientBalance {
                account: *id,
                available: info.balance,
                required: amount,
            });
        }
        info.balance -= amount;
        self.write(*id, info);
        Ok(())
    }

    /// Transfert de balance. Aucun effet en cas d'erreur.
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), StateError> {
        let snapshot = self.snapshot();
        self.sub_balance(from, amount)?;
        if let Err(e) = self.add_balance(to, amount) {
            self.revert_to_snapshot(snapshot);
            return Err(e);
        }
        Ok(())
    }

    /// Create an empty account if absent. Returns false when it already exists.
    pub fn create_account(&mut self, id: &AccountId) -> bool {
        if self.exists(id) {
            return false;
        }
        self.write(*id, AccountInfo::new());
        true
    }

    /// Bind subsequent logs to a transaction
    pub fn set_tx_context(&mut self, tx_hash: Hash, tx_index: u32) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    pub fn add_log(&mut self, mut log: Log) {
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index;
        log.log_index = self.logs.len() as u32;
        self.logs.push(log);
    }

    /// Logs emitted by one transaction
    pub fn tx_logs(&self, tx_hash: &Hash) -> Vec<Log> {
        self.logs
            .iter()
            .filter(|l| l.tx_hash == *tx_hash)
            .cloned()
            .collect()
    }

    /// Every log emitted in the block so far
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            journal_len: self.journal.len(),
            logs_len: self.logs.len(),
        }
    }

    /// Undo every mutation made after `snapshot` was taken
    pub fn revert_to_snapshot(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.journal_len {
            match self.journal.pop() {
                Some(JournalEntry::Account { id, previous }) => match previous {
                    Some(info) => {
                        self.accounts.insert(id, info);
                    }
                    None => {
                        self.accounts.remove(&id);
                    }
                },
                None => break,
            }
        }
        self.logs.truncate(snapshot.logs_len);
    }

    /// Drop the journal; earlier snapshots become invalid
    pub fn finalise(&mut self) {
        self.journal.clear();
    }

    /// Merkle root over the accounts in id order
    pub fn root(&self) -> Hash {
        merkle_root(
            self.accounts
                .iter()
                .filter_map(|entry| bincode::serialize(&entry).ok()),
        )
    }
}

/// Erreurs d'état
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Balance insuffisante pour {account}: disponible={available}, requis={required}")]
    InsufficientBalance {
        account: AccountId,
        available: Balance,
        required: Balance,
    },

    #[error("Balance overflow for {0}")]
    BalanceOverflow(AccountId),
}
