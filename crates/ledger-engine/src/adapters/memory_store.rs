//! In-memory [`AccountStore`].
//!
//! Transactions are serializable by construction: `begin()` takes an owned
//! async mutex guard over the whole state and holds it until commit or
//! drop, so at most one transaction is open at a time and a pessimistic
//! row lock is subsumed by the store-wide lock. A transaction stages its
//! writes on a snapshot; `commit` publishes the snapshot, dropping the
//! guard without commit discards it.
//!
//! Unique indexes (`system_address`, `(wallet_id, currency)`, transaction
//! `system_hash`, block `height` and `block_hash`) and the
//! `balance >= locked` check constraint reject writes with
//! [`StoreError::Constraint`], mirroring what a relational schema would do.

use crate::ports::{AccountStore, LockMode, StoreError, StoreTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_types::{Account, Block, Currency, LedgerTransaction, TxStatus, Wallet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
struct StoreState {
    wallets: HashMap<Uuid, Wallet>,
    accounts: HashMap<Uuid, Account>,
    account_ids_by_address: HashMap<String, Uuid>,
    transactions: HashMap<Uuid, LedgerTransaction>,
    tx_ids_by_hash: HashMap<String, Uuid>,
    blocks_by_height: std::collections::BTreeMap<u64, Block>,
}

/// Serializable in-memory store.
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_block_insert: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            fail_next_block_insert: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fault injection: the next `insert_block` fails with a transient
    /// error, simulating a sealing transaction that dies mid-commit.
    pub fn fail_next_block_insert(&self) {
        self.fail_next_block_insert.store(true, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryStoreTx {
            guard,
            staged,
            fail_next_block_insert: Arc::clone(&self.fail_next_block_insert),
        }))
    }
}

struct MemoryStoreTx {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
    fail_next_block_insert: Arc<AtomicBool>,
}

impl MemoryStoreTx {
    fn check_account_row(account: &Account) -> Result<(), StoreError> {
        if account.balance < account.locked {
            return Err(StoreError::Constraint(format!(
                "account {}: balance {} below locked {}",
                account.system_address, account.balance, account.locked
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn wallet_of_user(&mut self, user_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .staged
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn wallet_by_id(&mut self, id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self.staged.wallets.get(&id).cloned())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        if self.staged.wallets.contains_key(&wallet.id) {
            return Err(StoreError::Constraint(format!("duplicate wallet id {}", wallet.id)));
        }
        self.staged.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn account_by_address(
        &mut self,
        system_address: &str,
        _lock: LockMode,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .staged
            .account_ids_by_address
            .get(system_address)
            .and_then(|id| self.staged.accounts.get(id))
            .cloned())
    }

    async fn account_owned_by(
        &mut self,
        system_address: &str,
        user_id: Uuid,
        lock: LockMode,
    ) -> Result<Option<Account>, StoreError> {
        let Some(account) = self.account_by_address(system_address, lock).await? else {
            return Ok(None);
        };
        let owned = self
            .staged
            .wallets
            .get(&account.wallet_id)
            .is_some_and(|w| w.user_id == user_id);
        Ok(owned.then_some(account))
    }

    async fn account_by_id(
        &mut self,
        id: Uuid,
        _lock: LockMode,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.staged.accounts.get(&id).cloned())
    }

    async fn wallet_account_in_currency(
        &mut self,
        wallet_id: Uuid,
        currency: &Currency,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .staged
            .accounts
            .values()
            .find(|a| a.wallet_id == wallet_id && &a.currency == currency)
            .cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        Self::check_account_row(account)?;
        if self
            .staged
            .account_ids_by_address
            .contains_key(&account.system_address)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate system_address {}",
                account.system_address
            )));
        }
        if self
            .wallet_account_in_currency(account.wallet_id, &account.currency)
            .await?
            .is_some()
        {
            return Err(StoreError::Constraint(format!(
                "wallet {} already holds a {} account",
                account.wallet_id, account.currency
            )));
        }
        self.staged
            .account_ids_by_address
            .insert(account.system_address.clone(), account.id);
        self.staged.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        Self::check_account_row(account)?;
        if !self.staged.accounts.contains_key(&account.id) {
            return Err(StoreError::Constraint(format!("unknown account {}", account.id)));
        }
        self.staged.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn transaction_by_id(
        &mut self,
        id: Uuid,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        Ok(self.staged.transactions.get(&id).cloned())
    }

    async fn transaction_by_hash(
        &mut self,
        system_hash: &str,
    ) -> Result<Option<LedgerTransaction>, StoreError> {
        Ok(self
            .staged
            .tx_ids_by_hash
            .get(system_hash)
            .and_then(|id| self.staged.transactions.get(id))
            .cloned())
    }

    async fn insert_transaction(&mut self, tx: &LedgerTransaction) -> Result<(), StoreError> {
        if self.staged.tx_ids_by_hash.contains_key(&tx.system_hash) {
            return Err(StoreError::Constraint(format!(
                "duplicate system_hash {}",
                tx.system_hash
            )));
        }
        self.staged
            .tx_ids_by_hash
            .insert(tx.system_hash.clone(), tx.id);
        self.staged.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn save_transaction(&mut self, tx: &LedgerTransaction) -> Result<(), StoreError> {
        if !self.staged.transactions.contains_key(&tx.id) {
            return Err(StoreError::Constraint(format!("unknown transaction {}", tx.id)));
        }
        self.staged.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn confirm_transactions(
        &mut self,
        ids: &[Uuid],
        block_id: Uuid,
        block_height: u64,
    ) -> Result<(), StoreError> {
        for id in ids {
            let Some(row) = self.staged.transactions.get_mut(id) else {
                return Err(StoreError::Constraint(format!("unknown transaction {id}")));
            };
            if row.status != TxStatus::Processing {
                return Err(StoreError::Constraint(format!(
                    "transaction {id} is {} and cannot be confirmed",
                    row.status
                )));
            }
            row.status = TxStatus::Confirmed;
            row.block_id = Some(block_id);
            row.block_height = Some(block_height);
        }
        Ok(())
    }

    async fn pending_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, StoreError> {
        let mut rows: Vec<LedgerTransaction> = self
            .staged
            .transactions
            .values()
            .filter(|t| t.status == TxStatus::Pending && t.created_at < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        Ok(rows)
    }

    async fn processing_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerTransaction>, StoreError> {
        let mut rows: Vec<LedgerTransaction> = self
            .staged
            .transactions
            .values()
            .filter(|t| {
                t.status == TxStatus::Processing
                    && t.block_id.is_none()
                    && t.created_at < cutoff
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        Ok(rows)
    }

    async fn transactions_in_block(
        &mut self,
        block_id: Uuid,
    ) -> Result<Vec<LedgerTransaction>, StoreError> {
        let mut rows: Vec<LedgerTransaction> = self
            .staged
            .transactions
            .values()
            .filter(|t| t.block_id == Some(block_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.system_hash.cmp(&b.system_hash));
        Ok(rows)
    }

    async fn latest_block(&mut self) -> Result<Option<Block>, StoreError> {
        Ok(self
            .staged
            .blocks_by_height
            .values()
            .next_back()
            .cloned())
    }

    async fn block_by_height(&mut self, height: u64) -> Result<Option<Block>, StoreError> {
        Ok(self.staged.blocks_by_height.get(&height).cloned())
    }

    async fn insert_block(&mut self, block: &Block) -> Result<(), StoreError> {
        if self.fail_next_block_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transient("injected block insert failure".into()));
        }
        if self.staged.blocks_by_height.contains_key(&block.height) {
            return Err(StoreError::Constraint(format!(
                "duplicate block height {}",
                block.height
            )));
        }
        if self
            .staged
            .blocks_by_height
            .values()
            .any(|b| b.block_hash == block.block_hash)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate block hash {}",
                block.block_hash
            )));
        }
        self.staged.blocks_by_height.insert(block.height, block.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryStoreTx { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Dropping the staged snapshot is the rollback.
        Ok(())
    }
}
