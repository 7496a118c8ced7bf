//! Transactional persistence seam.
//!
//! The store owns every persisted row. All engine mutations happen inside a
//! [`StoreTx`]: begin, read with the required lock strength, stage writes,
//! then commit or roll back. Dropping an open transaction without
//! committing discards its staged writes.
//!
//! Uniqueness (`system_address`, `(wallet_id, currency)`, transaction
//! `system_hash`, block `height`) and the `balance >= locked` check are
//! enforced by the store as well as by the code paths that write; a
//! violation surfaces as [`StoreError::Constraint`], distinguishable from
//! transient failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_types::{Account, Block, Currency, LedgerTransaction, Wallet};
use thiserror::Error;
use uuid::Uuid;

/// Lock strength requested with a row read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockMode {
    /// Plain read.
    #[default]
    None,
    /// Pessimistic write lock: the row is held against concurrent writers
    /// until the transaction ends.
    PessimisticWrite,
}

/// Persistence-layer failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique or check constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Deadlock, lock timeout, lost connection. Retryable.
    #[error("transient store failure: {0}")]
    Transient(String),
}

/// Entry point: opens store transactions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Begins a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open store transaction.
#[async_trait]
pub trait StoreTx: Send {
    /// Wallet owned by a user, if any.
    async fn wallet_of_user(&mut self, user_id: Uuid) -> Result<Option<Wallet>, StoreError>;

    /// Wallet by row id.
    async fn wallet_by_id(&mut self, id: Uuid) -> Result<Option<Wallet>, StoreError>;

    /// Inserts a wallet row.
    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;

    /// Account by external address.
    async fn account_by_address(
        &mut self,
        system_address: &str,
        lock: LockMode,
    ) -> Result<Option<Account>, StoreError>;

    /// Account by external address, restricted to accounts whose wallet
    /// belongs to `user_id`.
    async fn account_owned_by(
        &mut self,
        system_address: &str,
        user_id: Uuid,
        lock: LockMode,
    ) -> Result<Option<Account>, StoreError>;

    /// Account by row id.
    async fn account_by_id(
        &mut self,
        id: Uuid,
        lock: LockMode,
    ) -> Result<Option<Account>, StoreError>;

    /// Account in a wallet for a currency, if one exists.
    async fn wallet_account_in_currency(
        &mut self,
        wallet_id: Uuid,
        currency: &Currency,
    ) -> Result<Option<Account>, StoreError>;

    /// Inserts an account row.
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Updates an existing account row.
    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Transaction by row id.
    async fn transaction_by_id(
        &mut self,
        id: Uuid,
    ) -> Result<Option<LedgerTransaction>, StoreError>;

    /// Transaction by external system hash.
    async fn transaction_by_hash(
        &mut self,
        system_hash: &str,
    ) -> Result<Option<LedgerTransaction>, StoreError>;

    /// Inserts a transaction row.
    async fn insert_transaction(&mut self, tx: &LedgerTransaction) -> Result<(), StoreError>;

    /// Updates an existing transaction row.
    async fn save_transaction(&mut self, tx: &LedgerTransaction) -> Result<(), StoreError>;

    /// Bulk-flips PROCESSING rows to CONFIRMED and assigns their block.
    /// Rejects the whole batch if any id is missing or not PROCESSING.
    async fn confirm_transactions(
        &mut self,
        ids: &[Uuid],
        block_id: Uuid,
        block_height: u64,
    ) -> Result<(), StoreError>;

    /// PENDING rows created before `cutoff` (janitor scan).
    async fn pending_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, StoreError>;

    /// Block-less PROCESSING rows created before `cutoff` (stuck scan).
    async fn processing_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, StoreError>;

    /// Transactions sealed into a block.
    async fn transactions_in_block(
        &mut self,
        block_id: Uuid,
    ) -> Result<Vec<LedgerTransaction>, StoreError>;

    /// Highest-height block, if the chain is non-empty.
    async fn latest_block(&mut self) -> Result<Option<Block>, StoreError>;

    /// Block at an exact height.
    async fn block_by_height(&mut self, height: u64) -> Result<Option<Block>, StoreError>;

    /// Inserts a block row. A duplicate height means another sealer won
    /// the race and surfaces as [`StoreError::Constraint`].
    async fn insert_block(&mut self, block: &Block) -> Result<(), StoreError>;

    /// Publishes all staged writes.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards all staged writes.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
