//! End-to-end transfer flows: submission through execution to sealing.

use crate::fixtures::Harness;
use ledger_engine::{EngineError, PipelineConfig};
use ledger_types::{Amount, TxStatus};

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_happy_path_transfer() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let tx_id = h.submit(alice, &a, &b, "150.75").await;

    // After intake: funds reserved, nonce bumped, row PENDING.
    let sender = h.account(a.id).await;
    assert_eq!(sender.balance, amt("1000"));
    assert_eq!(sender.locked, amt("150.75"));
    assert_eq!(sender.nonce, 1);
    assert_eq!(h.account(b.id).await.balance, amt("0"));
    assert_eq!(h.transaction(tx_id).await.status, TxStatus::Pending);

    // Balance view reflects the reservation.
    let snapshot = h
        .engine
        .balances
        .balance_of(alice, &a.system_address)
        .await
        .unwrap();
    assert_eq!(snapshot.available, amt("849.25"));
    assert_eq!(snapshot.locked, amt("150.75"));
    assert_eq!(snapshot.total, amt("1000"));
    assert_eq!(snapshot.nonce, 1);

    // One cycle executes and seals at height 0.
    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(block.height, 0);

    let sender = h.account(a.id).await;
    assert_eq!(sender.balance, amt("849.25"));
    assert_eq!(sender.locked, amt("0"));
    assert_eq!(h.account(b.id).await.balance, amt("150.75"));

    let row = h.transaction(tx_id).await;
    assert_eq!(row.status, TxStatus::Confirmed);
    assert_eq!(row.block_height, Some(0));
    assert_eq!(row.block_id, Some(block.id));
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "10").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let err = h
        .engine
        .intake
        .submit_transfer(alice, &a.system_address, &b.system_address, "50", "NGN", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));

    let sender = h.account(a.id).await;
    assert_eq!(sender.balance, amt("10"));
    assert_eq!(sender.locked, amt("0"));
    assert_eq!(sender.nonce, 0);
    assert_eq!(h.mempool_len().await, 0);
}

#[tokio::test]
async fn test_concurrent_double_spend_admits_exactly_one() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "100").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let first = h.engine.intake.submit_transfer(
        alice,
        &a.system_address,
        &b.system_address,
        "80",
        "NGN",
        None,
    );
    let second = h.engine.intake.submit_transfer(
        alice,
        &a.system_address,
        &b.system_address,
        "80",
        "NGN",
        None,
    );
    let (left, right) = tokio::join!(first, second);

    let outcomes = [left, right];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    match loser.as_ref().unwrap_err() {
        EngineError::InsufficientFunds { available, requested } => {
            assert_eq!(*available, amt("20"));
            assert_eq!(*requested, amt("80"));
        }
        other => panic!("expected InsufficientFunds, got {other}"),
    }

    let sender = h.account(a.id).await;
    assert_eq!(sender.balance, amt("100"));
    assert_eq!(sender.locked, amt("80"));
    assert_eq!(sender.nonce, 1);
    assert_eq!(h.mempool_len().await, 1);
}

#[tokio::test]
async fn test_size_based_sealing() {
    let mut config = PipelineConfig::for_testing();
    config.min_txs_per_block = 3;
    config.block_time_ms = 60_000;
    let h = Harness::new(config);
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let first = h.submit(alice, &a, &b, "1").await;
    let second = h.submit(alice, &a, &b, "2").await;
    assert!(h.engine.pipeline.cycle().await.unwrap().is_none());
    assert!(h.block_at(0).await.is_none());
    assert_eq!(h.transaction(first).await.status, TxStatus::Processing);
    assert_eq!(h.transaction(second).await.status, TxStatus::Processing);

    let third = h.submit(alice, &a, &b, "3").await;
    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(block.height, 0);
    let members = h.block_members(block.id).await;
    assert_eq!(members.len(), 3);
    for id in [first, second, third] {
        assert_eq!(h.transaction(id).await.status, TxStatus::Confirmed);
    }
}

#[tokio::test]
async fn test_time_based_sealing() {
    let mut config = PipelineConfig::for_testing();
    config.min_txs_per_block = 3;
    config.block_time_ms = 1_000;
    let h = Harness::new(config);
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    let tx_id = h.submit(alice, &a, &b, "5").await;
    h.clock.advance_ms(1_200);

    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(block.height, 0);
    assert!(block.previous_block_hash.is_none());
    assert_eq!(h.block_members(block.id).await.len(), 1);
    assert_eq!(h.transaction(tx_id).await.status, TxStatus::Confirmed);
}

#[tokio::test]
async fn test_chain_linkage_across_cycles() {
    let mut config = PipelineConfig::for_testing();
    config.min_txs_per_block = 3;
    config.block_time_ms = 1_000;
    let h = Harness::new(config);
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    h.submit(alice, &a, &b, "5").await;
    h.clock.advance_ms(1_200);
    let genesis = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(genesis.height, 0);

    h.submit(alice, &a, &b, "6").await;
    h.clock.advance_ms(2_000);
    let next = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(next.height, 1);
    assert_eq!(
        next.previous_block_hash.as_deref(),
        Some(genesis.block_hash.as_str())
    );
}

#[tokio::test]
async fn test_janitor_recovers_orphaned_submission() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "1000").await;
    let (_bob, b) = h.funded_account("NGN", "0").await;

    // The queue is down exactly between commit and enqueue.
    h.queue.fail_pushes(true);
    let receipt = h
        .engine
        .intake
        .submit_transfer(alice, &a.system_address, &b.system_address, "10", "NGN", None)
        .await
        .unwrap();
    h.queue.fail_pushes(false);

    assert_eq!(h.transaction(receipt.tx_id).await.status, TxStatus::Pending);
    assert_eq!(h.mempool_len().await, 0);
    // A cycle has nothing to do yet.
    assert!(h.engine.pipeline.cycle().await.unwrap().is_none());

    // Past the staleness threshold the janitor resurfaces the row.
    h.clock.advance_ms(121_000);
    assert_eq!(h.engine.pipeline.sweep_orphans().await.unwrap(), 1);
    let block = h.engine.pipeline.cycle().await.unwrap().unwrap();
    assert_eq!(block.height, 0);
    assert_eq!(h.transaction(receipt.tx_id).await.status, TxStatus::Confirmed);
    assert_eq!(h.account(b.id).await.balance, amt("10"));
}

#[tokio::test]
async fn test_transaction_visibility_follows_endpoints() {
    let h = Harness::sealing_every_cycle();
    let (alice, a) = h.funded_account("NGN", "100").await;
    let (bob, b) = h.funded_account("NGN", "0").await;
    let (mallory, _m) = h.funded_account("NGN", "0").await;

    let tx_id = h.submit(alice, &a, &b, "5").await;
    let hash = h.transaction(tx_id).await.system_hash;

    assert!(h.engine.accounts.transaction_of(alice, &hash).await.is_ok());
    assert!(h.engine.accounts.transaction_of(bob, &hash).await.is_ok());
    assert!(matches!(
        h.engine.accounts.transaction_of(mallory, &hash).await,
        Err(EngineError::Forbidden(_))
    ));
}
