//! Lease-guarded single-transaction execution.
//!
//! The caller holds the `lock:tx:{id}` lease for the duration of the call;
//! within it the executor opens its own store transaction, re-reads both
//! endpoints and applies the debit/credit. The operation is idempotent per
//! id: a missing row or a terminal row is dropped silently, a PROCESSING
//! row is returned untouched as already-owned work.

use crate::config::PipelineConfig;
use crate::domain::{release_lock, settle_transfer, SettleError};
use crate::error::{EngineError, Result};
use crate::ports::{AccountStore, LockMode, Queue};
use ledger_types::{LedgerTransaction, TxStatus};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Executes one mempool transaction at a time.
pub struct TransactionExecutor {
    store: Arc<dyn AccountStore>,
    queue: Arc<dyn Queue>,
    config: PipelineConfig,
}

impl TransactionExecutor {
    /// Creates the executor.
    pub fn new(store: Arc<dyn AccountStore>, queue: Arc<dyn Queue>, config: PipelineConfig) -> Self {
        Self { store, queue, config }
    }

    /// Executes a single transaction under the caller's lease.
    ///
    /// Returns the now-PROCESSING row when the debit/credit applied (or
    /// had already applied), `None` when the id was dropped, failed, or
    /// was already terminal.
    pub async fn execute_single(&self, tx_id: Uuid) -> Result<Option<LedgerTransaction>> {
        match self.try_execute(tx_id).await {
            Ok(outcome) => Ok(outcome),
            Err(EngineError::Store(err)) => {
                error!("[executor] store failure while executing {tx_id}: {err}");
                self.fail_with_compensation(tx_id, "store failure during execution")
                    .await;
                self.dead_letter(tx_id).await;
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    async fn try_execute(&self, tx_id: Uuid) -> Result<Option<LedgerTransaction>> {
        let mut tx = self.store.begin().await?;

        let Some(mut row) = tx.transaction_by_id(tx_id).await? else {
            // Stale id from a replayed queue entry.
            debug!("[executor] {tx_id} not found, dropping");
            tx.commit().await?;
            return Ok(None);
        };
        match row.status {
            TxStatus::Pending => {}
            TxStatus::Processing => {
                tx.commit().await?;
                return Ok(Some(row));
            }
            other => {
                debug!("[executor] {} already {other}, dropping", row.system_hash);
                tx.commit().await?;
                return Ok(None);
            }
        }

        row.transition_to(TxStatus::Processing)?;
        tx.save_transaction(&row).await?;

        let amount = row.amount;
        let Some(mut sender) = tx
            .account_by_id(row.from_account_id, LockMode::PessimisticWrite)
            .await?
        else {
            error!("[executor] {}: sender account is gone", row.system_hash);
            row.transition_to(TxStatus::Failed)?;
            row.failure_reason = Some("sender account missing".to_string());
            tx.save_transaction(&row).await?;
            tx.commit().await?;
            self.dead_letter(tx_id).await;
            return Ok(None);
        };
        let Some(mut recipient) = tx
            .account_by_id(row.to_account_id, LockMode::PessimisticWrite)
            .await?
        else {
            error!("[executor] {}: recipient account is gone", row.system_hash);
            row.transition_to(TxStatus::Failed)?;
            row.failure_reason = Some("recipient account missing".to_string());
            release_lock(&mut sender, amount);
            tx.save_account(&sender).await?;
            tx.save_transaction(&row).await?;
            tx.commit().await?;
            self.dead_letter(tx_id).await;
            return Ok(None);
        };

        match settle_transfer(&mut sender, &mut recipient, amount) {
            Ok(()) => {
                tx.save_account(&sender).await?;
                tx.save_account(&recipient).await?;
                tx.commit().await?;
                info!(
                    "[executor] executed {} ({} {})",
                    row.system_hash, amount, row.currency
                );
                Ok(Some(row))
            }
            Err(err @ SettleError::LockedShortfall { .. }) => {
                // The reservation is already gone; there is no lock to revert.
                error!("[executor] {}: {err}", row.system_hash);
                row.transition_to(TxStatus::Failed)?;
                row.failure_reason = Some(err.to_string());
                tx.save_transaction(&row).await?;
                tx.commit().await?;
                self.dead_letter(tx_id).await;
                Ok(None)
            }
            Err(err) => {
                error!("[executor] {}: {err}", row.system_hash);
                row.transition_to(TxStatus::Failed)?;
                row.failure_reason = Some(err.to_string());
                release_lock(&mut sender, amount);
                tx.save_account(&sender).await?;
                tx.save_transaction(&row).await?;
                tx.commit().await?;
                self.dead_letter(tx_id).await;
                Ok(None)
            }
        }
    }

    /// Best-effort compensation in a separate store transaction after the
    /// main one rolled back: mark the row FAILED and revert the sender's
    /// outstanding lock.
    async fn fail_with_compensation(&self, tx_id: Uuid, reason: &str) {
        let result: Result<()> = async {
            let mut tx = self.store.begin().await?;
            let Some(mut row) = tx.transaction_by_id(tx_id).await? else {
                return Ok(());
            };
            if row.status.is_terminal() {
                return Ok(());
            }
            let amount = row.amount;
            row.status = TxStatus::Failed;
            row.failure_reason = Some(reason.to_string());
            tx.save_transaction(&row).await?;

            if let Some(mut sender) = tx
                .account_by_id(row.from_account_id, LockMode::PessimisticWrite)
                .await?
            {
                release_lock(&mut sender, amount);
                tx.save_account(&sender).await?;
            }
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            error!("[executor] compensation for {tx_id} failed: {err}");
        }
    }

    async fn dead_letter(&self, tx_id: Uuid) {
        if let Err(err) = self
            .queue
            .lpush(&self.config.dead_letter_list, &tx_id.to_string())
            .await
        {
            warn!("[executor] dead-letter push for {tx_id} failed: {err}");
        }
    }
}
