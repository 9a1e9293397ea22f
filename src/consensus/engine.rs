// Engine - Block finalization and assembly
//
// Ordering and finality are decided by the external consensus layer, so the
// engine only seals what the executor replayed: it computes the commitment
// roots and builds the block.

use crate::storage::state::StateDb;
use crate::types::{merkle_root, Block, Header, Receipt, SignedTransaction};

/// Turns an executed round into a block
pub trait Engine: Send + Sync {
    /// Finalize the post-state and assemble the block.
    ///
    /// Fills the state, transactions and receipts roots of `header`.
    fn finalize_and_assemble(
        &self,
        header: Header,
        state: &mut StateDb,
        txs: Vec<SignedTransaction>,
        receipts: &[Receipt],
    ) -> Block;
}

/// Blocks are final as soon as they are committed. No uncles, no rewards.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantFinality;

impl Engine for InstantFinality {
    fn finalize_and_assemble(
        &self,
        mut header: Header,
        state: &mut StateDb,
        txs: Vec<SignedTransaction>,
        receipts: &[Receipt],
    ) -> Block {
        state.finalise();

        header.state_root = state.root();
        header.transactions_root = merkle_root(txs.iter().map(|tx| *tx.hash().as_bytes()));
        header.receipts_root = merkle_root(receipts.iter().map(Receipt::consensus_bytes));

        Block::new(header, txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, AccountInfo, Hash, LegacyTx, ReceiptStatus, Transaction, TxKind};
    use ed25519_dalek::SigningKey;

    fn transfer() -> SignedTransaction {
        Transaction::Legacy(LegacyTx {
            chain_id: Some(1),
            nonce: 0,
            gas_price: 1,
            gas: 21_000,
            to: Some(AccountId::from_bytes([2; 32])),
            value: 1,
            data: vec![],
        })
        .sign(&SigningKey::from_bytes(&[1; 32]))
        .unwrap()
    }

    #[test]
    fn test_roots_filled() {
        let mut state = StateDb::from_accounts([(AccountId::from_bytes([1; 32]), AccountInfo::with_balance(10))]);
        let tx = transfer();
        let receipt = Receipt {
            kind: TxKind::Legacy,
            status: ReceiptStatus::Successful,
            cumulative_gas_used: 21_000,
            gas_used: 21_000,
            tx_hash: tx.hash(),
            contract_address: None,
            logs: vec![],
            block_hash: Hash::ZERO,
            block_number: 1,
            tx_index: 0,
        };

        let block = InstantFinality.finalize_and_assemble(
            Header {
                number: 1,
                ..Default::default()
            },
            &mut state,
            vec![tx.clone()],
            &[receipt],
        );

        assert_eq!(block.header.state_root, state.root());
        assert_ne!(block.header.transactions_root, Hash::ZERO);
        assert_ne!(block.header.receipts_root, Hash::ZERO);
        assert_eq!(block.transactions, vec![tx]);
    }

    #[test]
    fn test_empty_block_has_zero_roots() {
        let mut state = StateDb::new();
        let block = InstantFinality.finalize_and_assemble(Header::default(), &mut state, vec![], &[]);
        assert_eq!(block.header.transactions_root, Hash::ZERO);
        assert_eq!(block.header.receipts_root, Hash::ZERO);
    }
}
