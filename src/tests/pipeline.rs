// Pipeline - Finalized batches from the gateway to the chain
// CommitBlock decoding, replay, block commit and baseline publication

#[cfg(test)]
mod commit_tests {
    use crate::execution::gas::DEFAULT_GAS_CEIL;
    use crate::genesis::dev_signing_key;
    use crate::node::environment::{prepare_work, GenerateParams};
    use crate::node::{BuildRequest, CancellationToken};
    use crate::rpc::gateway::GatewayError;
    use crate::rpc::types::{ExecBlock, ProtoTransaction};
    use crate::tests::harness::*;
    use crate::types::{unix_now, AccountId, GWEI};

    #[tokio::test]
    async fn test_malformed_entries_reported_good_ones_committed() {
        let mut h = Harness::dev(DEFAULT_GAS_CEIL);
        h.spawn_executor();
        let dev = dev_signing_key();
        let (tx0, tx1) = (transfer(&dev, 0, 2 * GWEI, 21_000), transfer(&dev, 1, 2 * GWEI, 21_000));
        h.add_remote(tx0.clone()).await.unwrap();
        h.add_remote(tx1.clone()).await.unwrap();

        let block = ExecBlock {
            txs: vec![envelope(&tx0), vec![0xde, 0xad, 0xbe, 0xef], envelope(&tx1)],
        };
        let result = h.gateway.commit_finalized_batch(block).await;
        assert!(matches!(result, Err(GatewayError::MalformedEntries { count: 1 })));
        assert_eq!(
            result.unwrap_err().to_string(),
            "There are 1 errors in the block"
        );

        let head = h.wait_for_baseline(1).await;
        let block = h.chain.block_by_number(1).unwrap().unwrap();
        assert_eq!(block.hash(), head.hash());
        assert_eq!(block.transactions, vec![tx0.clone(), tx1.clone()]);
        assert_eq!(block.header.gas_used, 42_000);

        // Receipts and their logs carry the block position
        let receipts = h.chain.receipts_by_hash(&block.hash()).unwrap().unwrap();
        assert_eq!(receipts.len(), block.transactions.len());
        for (index, receipt) in receipts.iter().enumerate() {
            assert_eq!(receipt.block_hash, block.hash());
            assert_eq!(receipt.block_number, 1);
            assert_eq!(receipt.tx_index, index as u32);
            assert!(!receipt.logs.is_empty());
            for log in &receipt.logs {
                assert_eq!(log.block_hash, block.hash());
                assert_eq!(log.block_number, 1);
            }
        }
        assert_eq!(receipts[1].cumulative_gas_used, 42_000);

        // Included transactions leave the pool
        assert!(h.pool.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);

        // No executor behind the gateway: nothing may be sent
        h.gateway.commit_finalized_batch(ExecBlock::default()).await.unwrap();
        assert_eq!(h.chain.current_header().unwrap().number, 0);
    }

    #[tokio::test]
    async fn test_fully_malformed_batch_sends_nothing() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let block = ExecBlock {
            txs: vec![vec![1, 2, 3], vec![]],
        };
        assert!(matches!(
            h.gateway.commit_finalized_batch(block).await,
            Err(GatewayError::MalformedEntries { count: 2 })
        ));
        assert_eq!(h.chain.current_header().unwrap().number, 0);
    }

    #[tokio::test]
    async fn test_non_canonical_entries_counted_malformed() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let tx = transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000);

        let mut padded = ProtoTransaction::normal(&tx).unwrap();
        padded.payload.extend(std::iter::repeat(0u8).take(200_000));
        let mut trailing = envelope(&tx);
        trailing.push(0);

        let block = ExecBlock {
            txs: vec![bincode::serialize(&padded).unwrap(), trailing],
        };
        assert!(matches!(
            h.gateway.commit_finalized_batch(block).await,
            Err(GatewayError::MalformedEntries { count: 2 })
        ));
        assert_eq!(h.chain.current_header().unwrap().number, 0);
    }

    #[tokio::test]
    async fn test_commit_after_executor_closed() {
        let mut h = Harness::dev(DEFAULT_GAS_CEIL);
        h.close_executor();
        let block = ExecBlock {
            txs: vec![envelope(&transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000))],
        };
        assert!(matches!(
            h.gateway.commit_finalized_batch(block).await,
            Err(GatewayError::ExecutorClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_transaction_reconsidered_next_round() {
        let mut h = Harness::dev(50_000);
        h.spawn_executor();
        let dev = dev_signing_key();
        let txs: Vec<_> = (0..3).map(|n| transfer(&dev, n, 2 * GWEI, 21_000)).collect();
        for tx in &txs {
            h.add_remote(tx.clone()).await.unwrap();
        }

        let round = || BuildRequest {
            token: CancellationToken::new(),
            timestamp: unix_now(),
        };

        // Round 1 only has headroom for two
        assert_eq!(h.builder().build_round(round()).await, 2);
        let ordered: Vec<Vec<u8>> = h.link.sent().iter().map(envelope).collect();
        h.gateway
            .commit_finalized_batch(ExecBlock { txs: ordered })
            .await
            .unwrap();
        h.wait_for_baseline(1).await;
        assert_eq!(h.pool.read().await.len(), 1);

        // Round 2 picks up the leftover on the new head
        assert_eq!(h.builder().build_round(round()).await, 1);
        assert_eq!(h.link.sent_hashes().last(), Some(&txs[2].hash()));
    }

    #[tokio::test]
    async fn test_consecutive_batches_chain_up() {
        let mut h = Harness::dev(DEFAULT_GAS_CEIL);
        h.spawn_executor();
        let dev = dev_signing_key();

        for n in 0..3 {
            let block = ExecBlock {
                txs: vec![envelope(&transfer(&dev, n, 2 * GWEI, 21_000))],
            };
            h.gateway.commit_finalized_batch(block).await.unwrap();
            h.wait_for_baseline(n + 1).await;
        }

        let mut parent = h.chain.block_by_number(0).unwrap().unwrap();
        for number in 1..=3 {
            let block = h.chain.block_by_number(number).unwrap().unwrap();
            assert_eq!(block.header.parent_hash, parent.hash());
            assert!(block.header.timestamp > parent.header.timestamp);
            parent = block;
        }
        let state = h.chain.state_at(&parent.header.state_root).unwrap();
        assert_eq!(state.nonce(&account(&dev)), 3);
    }

    #[tokio::test]
    async fn test_work_on_known_non_head_parent() {
        let mut h = Harness::dev(DEFAULT_GAS_CEIL);
        h.spawn_executor();
        let dev = dev_signing_key();

        for n in 0..2 {
            let block = ExecBlock {
                txs: vec![envelope(&transfer(&dev, n, 2 * GWEI, 21_000))],
            };
            h.gateway.commit_finalized_batch(block).await.unwrap();
            h.wait_for_baseline(n + 1).await;
        }
        let first = h.chain.block_by_number(1).unwrap().unwrap();
        assert_eq!(h.chain.current_header().unwrap().number, 2);

        // Build on block #1 while #2 is the head
        let params = GenerateParams {
            timestamp: first.header.timestamp + 1,
            parent_hash: Some(first.hash()),
            coinbase: AccountId::ZERO,
        };
        let mut env = prepare_work(h.chain.as_ref(), &h.rules, DEFAULT_GAS_CEIL, &params).unwrap();
        assert_eq!(env.header.number, 2);
        assert_eq!(env.header.parent_hash, first.hash());
        assert_eq!(env.state.nonce(&account(&dev)), 1);

        // Nonce 1 is next on this branch even though the head already used it
        let next = transfer(&dev, 1, 2 * GWEI, 21_000);
        h.batch_executor().execute_transactions(&mut env, &[next.clone()]);
        assert_eq!(env.txs(), &[next][..]);
        assert_eq!(env.state.nonce(&account(&dev)), 2);
    }
}

#[cfg(test)]
mod replay_tests {
    use crate::execution::gas::DEFAULT_GAS_CEIL;
    use crate::genesis::dev_signing_key;
    use crate::node::{ExecutionError, FinalizedBatch, WorkError};
    use crate::tests::harness::*;
    use crate::types::{unix_now, AccountId, LegacyTx, Transaction, GWEI};
    use std::sync::atomic::Ordering;

    fn batch(txs: Vec<crate::types::SignedTransaction>) -> FinalizedBatch {
        FinalizedBatch {
            received_at: unix_now(),
            txs,
        }
    }

    #[tokio::test]
    async fn test_failing_transactions_skipped() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let dev = dev_signing_key();
        let ok0 = transfer(&dev, 0, 2 * GWEI, 21_000);
        let ok1 = transfer(&dev, 1, 2 * GWEI, 21_000);
        let replayed = ok0.clone();
        let gapped = transfer(&dev, 5, 2 * GWEI, 21_000);
        let broke = transfer(&key(7), 0, 2 * GWEI, 21_000);

        let block = h
            .batch_executor()
            .execute_batch(batch(vec![ok0.clone(), replayed, gapped, ok1.clone(), broke]))
            .await
            .unwrap();

        assert_eq!(block.transactions, vec![ok0, ok1]);
        assert_eq!(block.header.gas_used, 42_000);
        let state = h.chain.state_at(&block.header.state_root).unwrap();
        assert_eq!(state.nonce(&account(&dev)), 2);
        assert_eq!(state.nonce(&account(&key(7))), 0);
    }

    #[tokio::test]
    async fn test_transaction_above_remaining_gas_skipped() {
        let (a, b) = (key(1), key(2));
        let h = Harness::new(60_000, Default::default(), &[&a, &b]);
        let first = transfer(&a, 0, 2 * GWEI, 30_000);
        let big = transfer(&a, 1, 2 * GWEI, 40_000);
        let small = transfer(&b, 0, 2 * GWEI, 21_000);

        let block = h
            .batch_executor()
            .execute_batch(batch(vec![first.clone(), big, small.clone()]))
            .await
            .unwrap();
        assert_eq!(block.transactions, vec![first, small]);
    }

    #[tokio::test]
    async fn test_replay_protection_enforced_on_replay() {
        let mut h = Harness::dev(DEFAULT_GAS_CEIL);
        h.rules.require_replay_protection = true;
        let dev = dev_signing_key();
        let unprotected = Transaction::Legacy(LegacyTx {
            chain_id: None,
            nonce: 0,
            gas_price: 2 * GWEI,
            gas: 21_000,
            to: Some(AccountId::from_bytes([0xee; 32])),
            value: 1,
            data: vec![],
        })
        .sign(&dev)
        .unwrap();
        let protected = transfer(&dev, 0, 2 * GWEI, 21_000);

        let block = h
            .batch_executor()
            .execute_batch(batch(vec![unprotected, protected.clone()]))
            .await
            .unwrap();
        assert_eq!(block.transactions, vec![protected]);
    }

    #[tokio::test]
    async fn test_write_to_chain_commits_prepared_env() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let dev = dev_signing_key();
        let executor = h.batch_executor();
        let mut env = h.work().prepare(unix_now()).await.unwrap();
        let txs: Vec<_> = (0..2).map(|n| transfer(&dev, n, 2 * GWEI, 21_000)).collect();
        executor.execute_transactions(&mut env, &txs);
        assert_eq!(env.tcount(), 2);

        let block = executor.write_to_chain(env).await.unwrap();

        assert_eq!(block.transactions, txs);
        assert_eq!(h.chain.current_header().unwrap().hash(), block.hash());
        let receipts = h.chain.receipts_by_hash(&block.hash()).unwrap().unwrap();
        for (index, receipt) in receipts.iter().enumerate() {
            assert_eq!(receipt.block_hash, block.hash());
            assert_eq!(receipt.tx_index, index as u32);
        }

        // The committed env is the new baseline, sealed header included
        let baseline = h.shared.read().await.env.clone().unwrap();
        assert_eq!(baseline.header.hash(), block.hash());
        assert_eq!(baseline.state.nonce(&account(&dev)), 2);
    }

    #[tokio::test]
    async fn test_empty_replay_still_commits_block() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let block = h
            .batch_executor()
            .execute_batch(batch(vec![transfer(&key(7), 0, 2 * GWEI, 21_000)]))
            .await
            .unwrap();

        assert!(block.transactions.is_empty());
        assert_eq!(h.chain.current_header().unwrap().hash(), block.hash());
    }

    #[tokio::test]
    async fn test_coinbase_credited_while_mining() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let miner = account(&key(9));
        h.running.store(true, Ordering::SeqCst);
        h.shared.write().await.coinbase = miner;

        let block = h
            .batch_executor()
            .execute_batch(batch(vec![transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000)]))
            .await
            .unwrap();

        assert_eq!(block.header.coinbase, miner);
        let state = h.chain.state_at(&block.header.state_root).unwrap();
        assert!(state.balance(&miner) > 0);
    }

    #[tokio::test]
    async fn test_batch_refused_while_mining_without_coinbase() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        h.running.store(true, Ordering::SeqCst);
        h.shared.write().await.coinbase = AccountId::ZERO;

        let result = h
            .batch_executor()
            .execute_batch(batch(vec![transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000)]))
            .await;
        assert!(matches!(result, Err(ExecutionError::Work(WorkError::NoCoinbase))));
        assert_eq!(h.chain.current_header().unwrap().number, 0);
    }
}
