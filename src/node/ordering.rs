// Ordering - Price-and-nonce ordered view over pending transactions
use crate::types::{AccountId, Balance, SignedTransaction};
use std::cmp::Ordering;
use std::collections::binary_heap::PeekMut;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

/// Head transaction of one account, keyed by its effective tip
#[derive(Debug, Clone)]
struct HeadTx {
    tx: SignedTransaction,
    tip: Balance,
}

impl HeadTx {
    /// `None` when the transaction cannot pay the base fee
    fn new(tx: SignedTransaction, base_fee: Option<Balance>) -> Option<Self> {
        let tip = tx.transaction.effective_tip(base_fee)?;
        Some(Self { tx, tip })
    }
}

// Higher tip = higher priority (max heap). Equal tips: lower sender id first.
impl PartialEq for HeadTx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeadTx {}

impl PartialOrd for HeadTx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeadTx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tip
            .cmp(&other.tip)
            .then_with(|| other.tx.sender.cmp(&self.tx.sender))
    }
}

/// Yields transactions best tip first across accounts while keeping each
/// account's transactions in nonce order.
///
/// Accounts whose head cannot pay the base fee are left out entirely.
pub struct TransactionsByPriceAndNonce {
    /// Remaining transactions of each account, after its current head
    txs: BTreeMap<AccountId, VecDeque<SignedTransaction>>,
    heads: BinaryHeap<HeadTx>,
    base_fee: Option<Balance>,
}

impl TransactionsByPriceAndNonce {
    /// Build from nonce-ascending per-account lists
    pub fn new(pending: BTreeMap<AccountId, Vec<SignedTransaction>>, base_fee: Option<Balance>) -> Self {
        let mut txs = BTreeMap::new();
        let mut heads = BinaryHeap::with_capacity(pending.len());

        for (account, list) in pending {
            let mut queue: VecDeque<SignedTransaction> = list.into();
            let head = match queue.pop_front().and_then(|tx| HeadTx::new(tx, base_fee)) {
                Some(head) => head,
                None => continue,
            };
            heads.push(head);
            txs.insert(account, queue);
        }

        Self {
            txs,
            heads,
            base_fee,
        }
    }

    /// Best transaction currently available
    pub fn peek(&self) -> Option<&SignedTransaction> {
        self.heads.peek().map(|head| &head.tx)
    }

    /// Effective tip of the current best transaction
    pub fn peek_tip(&self) -> Option<Balance> {
        self.heads.peek().map(|head| head.tip)
    }

    /// Replace the best transaction with the next one of the same account
    pub fn shift(&mut self) {
        let base_fee = self.base_fee;
        let Some(mut top) = self.heads.peek_mut() else {
            return;
        };
        let sender = top.tx.sender;
        let next = self
            .txs
            .get_mut(&sender)
            .and_then(VecDeque::pop_front)
            .and_then(|tx| HeadTx::new(tx, base_fee));

        match next {
            Some(head) => *top = head,
            None => {
                PeekMut::pop(top);
                self.txs.remove(&sender);
            }
        }
    }

    /// Drop the best transaction and every later one of the same account
    pub fn pop(&mut self) {
        if let Some(head) = self.heads.pop() {
            self.txs.remove(&head.tx.sender);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}
