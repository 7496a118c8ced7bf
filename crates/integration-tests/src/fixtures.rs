//! Shared test harness.
//!
//! One engine wired over the in-memory adapters and a mock clock pinned to
//! a fixed epoch, plus helpers for seeding funded accounts and reading
//! rows back without going through a service.

use ledger_engine::adapters::{MemoryQueue, MemoryStore};
use ledger_engine::ports::{AccountStore, Clock, LockMode, MockClock, Queue, StoreTx};
use ledger_engine::{LedgerEngine, PipelineConfig};
use ledger_types::{Account, Block, LedgerTransaction};
use std::sync::Arc;
use uuid::Uuid;

/// Harness start time: 2023-11-14T22:13:20Z in epoch milliseconds.
pub const EPOCH_MS: i64 = 1_700_000_000_000;

/// Engine plus direct handles on the concrete adapters.
pub struct Harness {
    /// Concrete store, for direct row access and fault injection.
    pub store: Arc<MemoryStore>,
    /// Concrete queue, for list inspection and fault injection.
    pub queue: Arc<MemoryQueue>,
    /// Deterministic clock.
    pub clock: Arc<MockClock>,
    /// The assembled engine.
    pub engine: LedgerEngine,
}

impl Harness {
    /// Builds a harness with the given pipeline configuration.
    pub fn new(config: PipelineConfig) -> Self {
        let clock = Arc::new(MockClock::at_epoch_ms(EPOCH_MS));
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new(clock.clone() as Arc<dyn Clock>));
        let engine = LedgerEngine::new(
            store.clone() as Arc<dyn AccountStore>,
            queue.clone() as Arc<dyn Queue>,
            clock.clone() as Arc<dyn Clock>,
            config,
        );
        Self { store, queue, clock, engine }
    }

    /// Harness with `min_txs_per_block = 1` and a long force-seal timer,
    /// so every cycle seals whatever it executed.
    pub fn sealing_every_cycle() -> Self {
        Self::new(PipelineConfig::for_testing())
    }

    /// Opens an account for a fresh user and credits it directly in the
    /// store, the way an external funding collaborator would.
    pub async fn funded_account(&self, currency: &str, balance: &str) -> (Uuid, Account) {
        let user = Uuid::new_v4();
        let account = self
            .engine
            .accounts
            .open_account(user, currency)
            .await
            .expect("open account");

        let mut tx = self.store.begin().await.expect("begin");
        let mut row = tx
            .account_by_id(account.id, LockMode::None)
            .await
            .expect("find account")
            .expect("account exists");
        row.balance = balance.parse().expect("parse balance");
        tx.save_account(&row).await.expect("save account");
        tx.commit().await.expect("commit");
        (user, row)
    }

    /// Submits a transfer and returns its row id.
    pub async fn submit(
        &self,
        user: Uuid,
        from: &Account,
        to: &Account,
        amount: &str,
    ) -> Uuid {
        self.engine
            .intake
            .submit_transfer(
                user,
                &from.system_address,
                &to.system_address,
                amount,
                from.currency.as_str(),
                None,
            )
            .await
            .expect("submit transfer")
            .tx_id
    }

    /// Current state of an account row.
    pub async fn account(&self, id: Uuid) -> Account {
        let mut tx = self.store.begin().await.expect("begin");
        tx.account_by_id(id, LockMode::None)
            .await
            .expect("find account")
            .expect("account exists")
    }

    /// Current state of a transaction row.
    pub async fn transaction(&self, id: Uuid) -> LedgerTransaction {
        let mut tx = self.store.begin().await.expect("begin");
        tx.transaction_by_id(id)
            .await
            .expect("find transaction")
            .expect("transaction exists")
    }

    /// Block at a height, if sealed.
    pub async fn block_at(&self, height: u64) -> Option<Block> {
        let mut tx = self.store.begin().await.expect("begin");
        tx.block_by_height(height).await.expect("find block")
    }

    /// Member transactions of a block, sorted by system hash.
    pub async fn block_members(&self, block_id: Uuid) -> Vec<LedgerTransaction> {
        let mut tx = self.store.begin().await.expect("begin");
        tx.transactions_in_block(block_id).await.expect("members")
    }

    /// Length of the mempool list.
    pub async fn mempool_len(&self) -> u64 {
        self.queue.llen("tx:mempool").await.expect("llen")
    }
}
