// Candidates - Rounds streamed to the consensus layer
// Ordering, gas headroom, link failures and cancellation of a round

#[cfg(test)]
mod candidate_tests {
    use crate::execution::gas::DEFAULT_GAS_CEIL;
    use crate::genesis::dev_signing_key;
    use crate::node::{BuildError, BuildRequest, CancellationToken, InterruptSignal};
    use crate::rpc::types::{PacketType, Request, TransactionType};
    use crate::tests::harness::*;
    use crate::types::{unix_now, AccountId, GWEI};
    use std::sync::atomic::Ordering;

    fn request() -> BuildRequest {
        BuildRequest {
            token: CancellationToken::new(),
            timestamp: unix_now(),
        }
    }

    // ===== NONCE ORDER =====

    #[tokio::test]
    async fn test_single_account_sent_in_nonce_order() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let dev = dev_signing_key();

        // Inserted out of order
        let txs: Vec<_> = (0..3).map(|n| transfer(&dev, n, 2 * GWEI, 21_000)).collect();
        for tx in [&txs[2], &txs[0], &txs[1]] {
            h.add_remote(tx.clone()).await.unwrap();
        }

        let sent = h.builder().build_round(request()).await;

        assert_eq!(sent, 3);
        let nonces: Vec<_> = h.link.sent().iter().map(|tx| tx.nonce()).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_packets_are_client_packets() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let tx = transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000);
        h.add_remote(tx.clone()).await.unwrap();

        h.builder().build_round(request()).await;

        let packets = h.link.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type, PacketType::ClientPacket);
        assert_eq!(packets[0].consensus_id, -1);
        assert_eq!(packets[0].epoch, -1);

        let request: Request = bincode::deserialize(&packets[0].msg).unwrap();
        assert_eq!(request.tx.kind, TransactionType::Normal);
        assert_eq!(request.tx.decode_transaction().unwrap(), tx);
    }

    // ===== PRICE ORDER =====

    #[tokio::test]
    async fn test_best_tip_first_across_accounts() {
        let (a, b) = (key(1), key(2));
        let h = Harness::new(DEFAULT_GAS_CEIL, Default::default(), &[&a, &b]);

        let cheap = transfer(&a, 0, 2 * GWEI, 21_000);
        let pricey = transfer(&b, 0, 5 * GWEI, 21_000);
        h.add_remote(cheap.clone()).await.unwrap();
        h.add_remote(pricey.clone()).await.unwrap();

        h.builder().build_round(request()).await;
        assert_eq!(h.link.sent_hashes(), vec![pricey.hash(), cheap.hash()]);
    }

    #[tokio::test]
    async fn test_locals_before_remotes() {
        let (a, b) = (key(1), key(2));
        let h = Harness::new(DEFAULT_GAS_CEIL, Default::default(), &[&a, &b]);

        let remote = transfer(&a, 0, 9 * GWEI, 21_000);
        let local = transfer(&b, 0, 2 * GWEI, 21_000);
        h.add_remote(remote.clone()).await.unwrap();
        h.add_local(local.clone()).await.unwrap();

        h.builder().build_round(request()).await;
        assert_eq!(h.link.sent_hashes(), vec![local.hash(), remote.hash()]);
    }

    // ===== GAS HEADROOM =====

    #[tokio::test]
    async fn test_round_bounded_by_gas_limit() {
        let h = Harness::dev(50_000);
        let dev = dev_signing_key();
        for n in 0..3 {
            h.add_remote(transfer(&dev, n, 2 * GWEI, 21_000)).await.unwrap();
        }

        let sent = h.builder().build_round(request()).await;

        // 50k fits two transfers, the rest stays pooled
        assert_eq!(sent, 2);
        assert_eq!(h.pool.read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_oversized_transaction_skipped_for_smaller_ones() {
        let (a, b) = (key(1), key(2));
        let h = Harness::new(60_000, Default::default(), &[&a, &b]);

        // Best tip, but does not fit next to the first one
        let first = transfer(&a, 0, 9 * GWEI, 30_000);
        let big = transfer(&a, 1, 9 * GWEI, 40_000);
        let small = transfer(&b, 0, 2 * GWEI, 21_000);
        for tx in [&first, &big, &small] {
            h.add_remote(tx.clone()).await.unwrap();
        }

        h.builder().build_round(request()).await;
        assert_eq!(h.link.sent_hashes(), vec![first.hash(), small.hash()]);
    }

    // ===== FAILURES =====

    #[tokio::test]
    async fn test_link_failure_drops_account() {
        let (a, b) = (key(1), key(2));
        let h = Harness::new(DEFAULT_GAS_CEIL, Default::default(), &[&a, &b]);

        let refused = transfer(&a, 0, 9 * GWEI, 21_000);
        let follower = transfer(&a, 1, 9 * GWEI, 21_000);
        let other = transfer(&b, 0, 2 * GWEI, 21_000);
        for tx in [&refused, &follower, &other] {
            h.add_remote(tx.clone()).await.unwrap();
        }
        h.link.fail_on(refused.hash());

        let sent = h.builder().build_round(request()).await;

        // The nonce chain of `a` cannot continue past the refused one
        assert_eq!(sent, 1);
        assert_eq!(h.link.sent_hashes(), vec![other.hash()]);
    }

    #[tokio::test]
    async fn test_no_round_while_mining_without_coinbase() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        h.add_remote(transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000))
            .await
            .unwrap();
        h.running.store(true, Ordering::SeqCst);
        h.shared.write().await.coinbase = AccountId::ZERO;

        assert_eq!(h.builder().build_round(request()).await, 0);
        assert!(h.link.packets().is_empty());
    }

    // ===== CANCELLATION =====

    #[tokio::test]
    async fn test_interrupted_round_stops_between_sends() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        let dev = dev_signing_key();
        for n in 0..3 {
            h.add_remote(transfer(&dev, n, 2 * GWEI, 21_000)).await.unwrap();
        }

        let token = CancellationToken::new();
        h.link.interrupt_after(1, token.clone(), InterruptSignal::NewHead);

        let mut env = h.work().prepare(unix_now()).await.unwrap();
        let result = h.builder().fill_transactions(&token, &mut env).await;

        assert_eq!(result, Err(BuildError::Interrupted(InterruptSignal::NewHead)));
        assert_eq!(h.link.packets().len(), 1);
    }

    #[tokio::test]
    async fn test_signaled_token_sends_nothing() {
        let h = Harness::dev(DEFAULT_GAS_CEIL);
        h.add_remote(transfer(&dev_signing_key(), 0, 2 * GWEI, 21_000))
            .await
            .unwrap();

        let token = CancellationToken::new();
        token.signal(InterruptSignal::Resubmit);
        let mut env = h.work().prepare(unix_now()).await.unwrap();

        assert!(h.builder().fill_transactions(&token, &mut env).await.is_err());
        assert!(h.link.packets().is_empty());
    }
}
