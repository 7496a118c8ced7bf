//! Transfer intake.
//!
//! Funds are reserved at submission: inside one store transaction the
//! sender row is loaded under a pessimistic write lock, `locked` grows by
//! the amount and the nonce is bumped, then the PENDING row is inserted.
//! Concurrent submissions from the same account therefore cannot
//! double-spend; the row lock serializes them and the loser sees the
//! reduced available balance.
//!
//! The mempool push happens strictly after commit, so a queued id always
//! refers to a durable PENDING row. The reverse gap (durable row, failed
//! push) is closed by the janitor sweep.

use crate::config::{balance_cache_key, PipelineConfig};
use crate::domain::reserve_funds;
use crate::error::{EngineError, Result};
use crate::ports::{AccountStore, Clock, LockMode, Queue};
use ledger_types::{Amount, Currency, LedgerTransaction, TxStatus};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What the caller gets back from a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Row id of the new transaction.
    pub tx_id: Uuid,
    /// External `txn_<hex>` handle.
    pub system_hash: String,
    /// Always [`TxStatus::Pending`] at submission.
    pub status: TxStatus,
}

/// Validates, reserves and enqueues transfers.
pub struct TransferIntake {
    store: Arc<dyn AccountStore>,
    queue: Arc<dyn Queue>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl TransferIntake {
    /// Creates the intake service.
    pub fn new(
        store: Arc<dyn AccountStore>,
        queue: Arc<dyn Queue>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self { store, queue, clock, config }
    }

    /// Submits a transfer from `from_addr` to `to_addr` on behalf of
    /// `user_id`.
    ///
    /// # Errors
    /// - [`EngineError::InvalidInput`]: bad amount or currency, self
    ///   transfer, currency mismatch on either endpoint
    /// - [`EngineError::Forbidden`]: sender is not owned by `user_id`
    /// - [`EngineError::NotFound`]: recipient address does not exist
    /// - [`EngineError::InsufficientFunds`]: available balance short
    pub async fn submit_transfer(
        &self,
        user_id: Uuid,
        from_addr: &str,
        to_addr: &str,
        amount: &str,
        currency: &str,
        description: Option<String>,
    ) -> Result<TransferReceipt> {
        let amount: Amount = amount.parse()?;
        if !amount.is_positive() {
            return Err(EngineError::InvalidInput(
                "transfer amount must be positive".to_string(),
            ));
        }
        let currency = Currency::new(currency)?;
        if from_addr == to_addr {
            return Err(EngineError::InvalidInput(
                "sender and recipient must differ".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        let Some(mut sender) = tx
            .account_owned_by(from_addr, user_id, LockMode::PessimisticWrite)
            .await?
        else {
            return Err(EngineError::Forbidden(format!(
                "account {from_addr} is not owned by the requester"
            )));
        };
        if sender.currency != currency {
            return Err(EngineError::InvalidInput(format!(
                "account {from_addr} holds {}, not {currency}",
                sender.currency
            )));
        }

        let Some(recipient) = tx.account_by_address(to_addr, LockMode::None).await? else {
            return Err(EngineError::NotFound(format!("account {to_addr}")));
        };
        if recipient.currency != currency {
            return Err(EngineError::InvalidInput(format!(
                "account {to_addr} holds {}, not {currency}",
                recipient.currency
            )));
        }

        let account_nonce = sender.nonce;
        reserve_funds(&mut sender, amount)?;
        sender.nonce += 1;
        tx.save_account(&sender).await?;

        let row = LedgerTransaction::transfer(
            sender.id,
            recipient.id,
            amount,
            currency,
            account_nonce,
            description,
            self.clock.now(),
        );
        tx.insert_transaction(&row).await?;
        tx.commit().await?;

        info!(
            "[intake] accepted {} for {} {} ({} -> {}, nonce {})",
            row.system_hash, amount, row.currency, from_addr, to_addr, account_nonce
        );

        // Post-commit: the row is durable regardless of what happens here.
        if let Err(err) = self
            .queue
            .lpush(&self.config.mempool_list, &row.id.to_string())
            .await
        {
            warn!(
                "[intake] enqueue of {} failed, janitor will re-enqueue: {err}",
                row.system_hash
            );
        }
        if let Err(err) = self.queue.del(&balance_cache_key(from_addr)).await {
            warn!("[intake] balance cache invalidation for {from_addr} failed: {err}");
        }

        Ok(TransferReceipt {
            tx_id: row.id,
            system_hash: row.system_hash,
            status: TxStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryQueue, MemoryStore};
    use crate::ports::{MockClock, StoreTx};
    use crate::service::AccountService;
    use ledger_types::Account;

    struct Fixture {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        intake: TransferIntake,
        accounts: AccountService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(MockClock::at_epoch_ms(1_700_000_000_000));
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new(clock.clone() as Arc<dyn Clock>));
        let intake = TransferIntake::new(
            store.clone() as Arc<dyn AccountStore>,
            queue.clone() as Arc<dyn Queue>,
            clock as Arc<dyn Clock>,
            PipelineConfig::for_testing(),
        );
        let accounts = AccountService::new(store.clone() as Arc<dyn AccountStore>);
        Fixture { store, queue, intake, accounts }
    }

    async fn fund(store: &MemoryStore, account: &Account, balance: &str) {
        let mut tx = store.begin().await.unwrap();
        let mut row = tx
            .account_by_id(account.id, LockMode::None)
            .await
            .unwrap()
            .unwrap();
        row.balance = balance.parse().unwrap();
        tx.save_account(&row).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_submission_reserves_funds_and_enqueues() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let from = fx.accounts.open_account(alice, "NGN").await.unwrap();
        let to = fx.accounts.open_account(bob, "NGN").await.unwrap();
        fund(&fx.store, &from, "1000").await;

        let receipt = fx
            .intake
            .submit_transfer(alice, &from.system_address, &to.system_address, "150.75", "NGN", None)
            .await
            .unwrap();
        assert_eq!(receipt.status, TxStatus::Pending);

        let mut tx = fx.store.begin().await.unwrap();
        let sender = tx.account_by_id(from.id, LockMode::None).await.unwrap().unwrap();
        assert_eq!(sender.balance, "1000".parse().unwrap());
        assert_eq!(sender.locked, "150.75".parse().unwrap());
        assert_eq!(sender.nonce, 1);

        let row = tx.transaction_by_id(receipt.tx_id).await.unwrap().unwrap();
        assert_eq!(row.status, TxStatus::Pending);
        assert_eq!(row.account_nonce, 0);
        drop(tx);

        assert_eq!(fx.queue.llen("tx:mempool").await.unwrap(), 1);
        assert_eq!(
            fx.queue.rpop("tx:mempool").await.unwrap().unwrap(),
            receipt.tx_id.to_string()
        );
    }

    #[tokio::test]
    async fn test_rejects_bad_input_without_state_change() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let from = fx.accounts.open_account(alice, "NGN").await.unwrap();
        let to = fx.accounts.open_account(bob, "NGN").await.unwrap();
        fund(&fx.store, &from, "100").await;

        let cases: Vec<(EngineError, &str)> = vec![
            (
                fx.intake
                    .submit_transfer(alice, &from.system_address, &to.system_address, "0", "NGN", None)
                    .await
                    .unwrap_err(),
                "zero amount",
            ),
            (
                fx.intake
                    .submit_transfer(alice, &from.system_address, &to.system_address, "nope", "NGN", None)
                    .await
                    .unwrap_err(),
                "malformed amount",
            ),
            (
                fx.intake
                    .submit_transfer(alice, &from.system_address, &from.system_address, "5", "NGN", None)
                    .await
                    .unwrap_err(),
                "self transfer",
            ),
            (
                fx.intake
                    .submit_transfer(alice, &from.system_address, &to.system_address, "5", "USD", None)
                    .await
                    .unwrap_err(),
                "wrong currency",
            ),
        ];
        for (err, what) in cases {
            assert!(matches!(err, EngineError::InvalidInput(_)), "{what}: {err}");
        }

        // Nothing was reserved or queued by any rejection.
        let mut tx = fx.store.begin().await.unwrap();
        let sender = tx.account_by_id(from.id, LockMode::None).await.unwrap().unwrap();
        assert_eq!(sender.locked, "0".parse().unwrap());
        assert_eq!(sender.nonce, 0);
        drop(tx);
        assert_eq!(fx.queue.llen("tx:mempool").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_foreign_sender_and_unknown_recipient() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let from = fx.accounts.open_account(alice, "NGN").await.unwrap();
        let to = fx.accounts.open_account(bob, "NGN").await.unwrap();
        fund(&fx.store, &from, "100").await;

        // Bob cannot spend from Alice's account.
        let err = fx
            .intake
            .submit_transfer(bob, &from.system_address, &to.system_address, "5", "NGN", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let err = fx
            .intake
            .submit_transfer(alice, &from.system_address, "acc_missing", "5", "NGN", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_counts_locked_portion() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let from = fx.accounts.open_account(alice, "NGN").await.unwrap();
        let to = fx.accounts.open_account(bob, "NGN").await.unwrap();
        fund(&fx.store, &from, "100").await;

        fx.intake
            .submit_transfer(alice, &from.system_address, &to.system_address, "80", "NGN", None)
            .await
            .unwrap();

        // available is now 20.
        let err = fx
            .intake
            .submit_transfer(alice, &from.system_address, &to.system_address, "80", "NGN", None)
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientFunds { available, requested } => {
                assert_eq!(available, "20".parse().unwrap());
                assert_eq!(requested, "80".parse().unwrap());
            }
            other => panic!("expected InsufficientFunds, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_enqueue_failure_still_returns_receipt() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let from = fx.accounts.open_account(alice, "NGN").await.unwrap();
        let to = fx.accounts.open_account(bob, "NGN").await.unwrap();
        fund(&fx.store, &from, "100").await;

        fx.queue.fail_pushes(true);
        let receipt = fx
            .intake
            .submit_transfer(alice, &from.system_address, &to.system_address, "10", "NGN", None)
            .await
            .unwrap();

        // Durable PENDING row, orphaned from the queue.
        let mut tx = fx.store.begin().await.unwrap();
        let row = tx.transaction_by_id(receipt.tx_id).await.unwrap().unwrap();
        assert_eq!(row.status, TxStatus::Pending);
        drop(tx);
        assert_eq!(fx.queue.llen("tx:mempool").await.unwrap(), 0);
    }
}
