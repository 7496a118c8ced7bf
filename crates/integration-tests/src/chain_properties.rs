//! Quantified ledger and chain invariants.

use crate::fixtures::Harness;
use ledger_engine::domain::{block_hash, merkle_root};
use ledger_engine::ports::Queue;
use ledger_engine::PipelineConfig;
use ledger_types::{Account, Amount, TxStatus};

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

fn total_supply(accounts: &[Account]) -> Amount {
    accounts.iter().fold(Amount::ZERO, |sum, a| {
        sum.checked_add(a.balance).expect("supply fits the range")
    })
}

fn assert_lock_discipline(accounts: &[Account]) {
    for account in accounts {
        assert!(
            account.balance >= account.locked,
            "{}: balance {} below locked {}",
            account.system_address,
            account.balance,
            account.locked
        );
    }
}

#[tokio::test]
async fn test_conservation_and_lock_discipline() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "600").await;
    let (bob, b) = h.funded_account("NGN", "300").await;
    let (carol, c) = h.funded_account("NGN", "100").await;
    let ids = [a.id, b.id, c.id];
    let initial = amt("1000");

    let transfers = [
        (alice, &a, &b, "150.75"),
        (bob, &b, &c, "25"),
        (carol, &c, &a, "99.99999999"),
        (alice, &a, &c, "0.00000001"),
    ];
    for (user, from, to, amount) in transfers {
        h.submit(user, from, to, amount).await;

        // Mid-flight: reservations exist, supply is unchanged.
        let mut accounts = Vec::new();
        for id in ids {
            accounts.push(h.account(id).await);
        }
        assert_eq!(total_supply(&accounts), initial);
        assert_lock_discipline(&accounts);

        h.engine.pipeline.cycle().await.unwrap();
        let mut accounts = Vec::new();
        for id in ids {
            accounts.push(h.account(id).await);
        }
        assert_eq!(total_supply(&accounts), initial);
        assert_lock_discipline(&accounts);
    }

    // Everything settled: no reservations left anywhere.
    for id in ids {
        assert_eq!(h.account(id).await.locked, amt("0"));
    }
}

#[tokio::test]
async fn test_chain_is_gapless_and_recomputable() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    for i in 1..=4u32 {
        h.submit(alice, &a, &b, &i.to_string()).await;
        h.clock.advance_ms(5_000);
        h.engine.pipeline.cycle().await.unwrap().unwrap();
    }

    let mut previous_hash: Option<String> = None;
    for height in 0..4u64 {
        let block = h
            .block_at(height)
            .await
            .unwrap_or_else(|| panic!("missing block at height {height}"));
        assert_eq!(block.height, height);
        assert_eq!(block.previous_block_hash, previous_hash);

        // Law: stored commitments recompute exactly from stored rows.
        let members = h.block_members(block.id).await;
        assert!(!members.is_empty());
        for member in &members {
            assert_eq!(member.status, TxStatus::Confirmed);
            assert_eq!(member.block_height, Some(height));
        }
        let mut hashes: Vec<String> =
            members.iter().map(|m| m.system_hash.clone()).collect();
        hashes.sort();
        assert_eq!(merkle_root(&hashes), block.merkle_root);
        assert_eq!(
            block_hash(
                block.height,
                block.timestamp,
                block.previous_block_hash.as_deref(),
                &hashes,
            ),
            block.block_hash
        );

        previous_hash = Some(block.block_hash.clone());
    }
    assert!(h.block_at(4).await.is_none());
}

#[tokio::test]
async fn test_merkle_commitment_ignores_batch_order() {
    let mut config = PipelineConfig::for_testing();
    config.min_txs_per_block = 3;
    let h = Harness::new(config);
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    for amount in ["1", "2", "3"] {
        h.submit(alice, &a, &b, amount).await;
    }
    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();

    let members = h.block_members(block.id).await;
    let mut hashes: Vec<String> = members.iter().map(|m| m.system_hash.clone()).collect();
    // Any permutation commits identically.
    hashes.reverse();
    assert_eq!(merkle_root(&hashes), block.merkle_root);
    hashes.rotate_left(1);
    assert_eq!(merkle_root(&hashes), block.merkle_root);
}

#[tokio::test]
async fn test_confirmation_is_at_most_once() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "100").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let tx_id = h.submit(alice, &a, &b, "10").await;
    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();
    let confirmed = h.transaction(tx_id).await;
    assert_eq!(confirmed.status, TxStatus::Confirmed);
    assert_eq!(confirmed.block_id, Some(block.id));

    // A replayed id is dropped by the executor without touching the row.
    assert!(h.engine.executor.execute_single(tx_id).await.unwrap().is_none());
    assert_eq!(h.transaction(tx_id).await, confirmed);

    // Replaying through the whole pipeline is equally harmless.
    h.queue.lpush("tx:mempool", &tx_id.to_string()).await.unwrap();
    assert!(h.engine.pipeline.cycle().await.unwrap().is_none());
    assert_eq!(h.transaction(tx_id).await, confirmed);
    assert_eq!(h.account(b.id).await.balance, amt("10"));
}

#[tokio::test]
async fn test_executor_is_idempotent_before_sealing() {
    let mut config = PipelineConfig::for_testing();
    config.min_txs_per_block = 5;
    let h = Harness::new(config);
    let (alice, a) = h.funded_account("NGN", "100").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;
    let tx_id = h.submit(alice, &a, &b, "40").await;

    let first = h.engine.executor.execute_single(tx_id).await.unwrap().unwrap();
    assert_eq!(first.status, TxStatus::Processing);
    let settled_sender = h.account(a.id).await;

    for _ in 0..5 {
        let replay = h.engine.executor.execute_single(tx_id).await.unwrap().unwrap();
        assert_eq!(replay.status, TxStatus::Processing);
        assert_eq!(h.account(a.id).await, settled_sender);
    }
    assert_eq!(h.account(b.id).await.balance, amt("40"));
}

#[tokio::test]
async fn test_nonces_increase_by_one_per_submission() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let mut rows = Vec::new();
    for amount in ["1", "2", "3", "4"] {
        let id = h.submit(alice, &a, &b, amount).await;
        rows.push(h.transaction(id).await);
        h.clock.advance_ms(1_000);
    }

    rows.sort_by_key(|r| r.created_at);
    for (expected, row) in rows.iter().enumerate() {
        assert_eq!(row.account_nonce, expected as u64);
    }
    assert_eq!(h.account(a.id).await.nonce, 4);
}

#[tokio::test]
async fn test_balance_cache_invalidated_on_seal() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "100").await;
    let (bob, b) = h.funded_account("NGN", "0").await;

    // Warm both caches.
    h.engine.balances.balance_of(alice, &a.system_address).await.unwrap();
    h.engine.balances.balance_of(bob, &b.system_address).await.unwrap();

    let _ = h.submit(alice, &a, &b, "10").await;
    h.engine.pipeline.cycle().await.unwrap().unwrap();

    // Fresh reads observe the settled balances, not the warm snapshots.
    let sender = h
        .engine
        .balances
        .balance_of(alice, &a.system_address)
        .await
        .unwrap();
    assert_eq!(sender.total, amt("90"));
    assert_eq!(sender.locked, amt("0"));
    let recipient = h
        .engine
        .balances
        .balance_of(bob, &b.system_address)
        .await
        .unwrap();
    assert_eq!(recipient.total, amt("10"));
}

#[tokio::test]
async fn test_distinct_users_cannot_cross_spend() {
    let h = Harness::sealing_every_cycle();
    let (_alice, a) = h.funded_account("NGN", "100").await;
    let (bob, b) = h.funded_account("NGN", "0").await;

    let err = h
        .engine
        .intake
        .submit_transfer(bob, &a.system_address, &b.system_address, "5", "NGN", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ledger_engine::EngineError::Forbidden(_)));
    assert_eq!(h.account(a.id).await.nonce, 0);
}
