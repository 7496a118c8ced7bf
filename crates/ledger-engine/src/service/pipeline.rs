//! Pipeline cycle orchestration and block sealing.
//!
//! Every cycle: drain a batch of ids from the mempool tail, execute each
//! under its own `SET NX EX` lease, then decide whether the collected
//! PROCESSING rows seal into a block.
//!
//! ## Seal condition
//!
//! Seal iff the collected set is non-empty AND (it reached
//! `min_txs_per_block` OR `block_time_ms` elapsed since the last seal).
//! Collected rows that do not seal are pushed back to the queue head so a
//! later cycle re-collects them; the executor recognises PROCESSING rows
//! as already-owned work, which is what makes the requeue safe.
//!
//! ## Failure posture
//!
//! A failed sealing commit pushes every collected id back to the queue and
//! leaves the rows PROCESSING: delivery is at-least-once end to end, and
//! confirmation is idempotent because the store only flips
//! PROCESSING -> CONFIRMED. Within one processor instance at most one
//! cycle runs at a time (a plain boolean flag); across instances the
//! per-transaction leases are the only coordination.

use crate::config::{balance_cache_key, tx_lease_key, PipelineConfig, LEASE_TTL_SECS};
use crate::domain::{assemble_block, SealCandidate};
use crate::error::Result;
use crate::ports::{AccountStore, Clock, LockMode, Queue};
use crate::service::executor::TransactionExecutor;
use chrono::{DateTime, Duration, Utc};
use ledger_types::{Block, LedgerTransaction};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Periodic transaction processor and block sealer.
pub struct TransactionPipeline {
    store: Arc<dyn AccountStore>,
    queue: Arc<dyn Queue>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    executor: TransactionExecutor,
    /// Single-flight guard: at most one cycle per instance.
    busy: AtomicBool,
    /// The only long-lived pipeline state.
    last_sealed_at: Mutex<DateTime<Utc>>,
}

impl TransactionPipeline {
    /// Creates the pipeline; `last_sealed_at` starts at construction time
    /// so the force-seal timer measures from boot.
    pub fn new(
        store: Arc<dyn AccountStore>,
        queue: Arc<dyn Queue>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        let executor = TransactionExecutor::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            config.clone(),
        );
        let started_at = clock.now();
        Self {
            store,
            queue,
            clock,
            config,
            executor,
            busy: AtomicBool::new(false),
            last_sealed_at: Mutex::new(started_at),
        }
    }

    /// Runs one processor cycle. Returns the sealed block, if any.
    pub async fn cycle(&self) -> Result<Option<Block>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("[pipeline] previous cycle still running, skipping");
            return Ok(None);
        }
        let outcome = self.cycle_inner().await;
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    async fn cycle_inner(&self) -> Result<Option<Block>> {
        let ids = self.drain_batch().await?;
        if ids.is_empty() {
            return Ok(None);
        }

        let collected = self.execute_batch(&ids).await;
        if collected.is_empty() {
            return Ok(None);
        }

        if !self.should_seal(collected.len()) {
            debug!(
                "[pipeline] holding {} processing txs below seal threshold",
                collected.len()
            );
            self.requeue(&collected).await;
            return Ok(None);
        }

        match self.seal(&collected).await {
            Ok(block) => Ok(Some(block)),
            Err(err) => {
                warn!(
                    "[sealer] sealing failed, requeueing {} txs: {err}",
                    collected.len()
                );
                self.requeue(&collected).await;
                Err(err)
            }
        }
    }

    /// Pops up to `batch_size` ids from the mempool tail. Unparseable
    /// entries go to the dead-letter list.
    async fn drain_batch(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(self.config.batch_size);
        while ids.len() < self.config.batch_size {
            let Some(raw) = self.queue.rpop(&self.config.mempool_list).await? else {
                break;
            };
            match Uuid::parse_str(&raw) {
                Ok(id) => ids.push(id),
                Err(_) => {
                    warn!("[pipeline] dropping malformed mempool entry {raw:?}");
                    let _ = self.queue.lpush(&self.config.dead_letter_list, &raw).await;
                }
            }
        }
        Ok(ids)
    }

    /// Executes each id under its lease; returns the rows that are now
    /// PROCESSING and owned by this cycle.
    async fn execute_batch(&self, ids: &[Uuid]) -> Vec<LedgerTransaction> {
        let mut collected = Vec::with_capacity(ids.len());
        for &id in ids {
            let lease = tx_lease_key(id);
            let acquired = match self.queue.set_nx_ex(&lease, "1", LEASE_TTL_SECS).await {
                Ok(acquired) => acquired,
                Err(err) => {
                    warn!("[pipeline] lease acquisition for {id} failed: {err}");
                    false
                }
            };
            if !acquired {
                // Another processor owns it; it will finish or its lease
                // will expire for a later cycle.
                debug!("[pipeline] lease for {id} is held elsewhere, skipping");
                continue;
            }

            match self.executor.execute_single(id).await {
                Ok(Some(row)) => collected.push(row),
                Ok(None) => {}
                Err(err) => {
                    error!("[pipeline] executing {id} failed: {err}");
                    let _ = self
                        .queue
                        .lpush(&self.config.dead_letter_list, &id.to_string())
                        .await;
                }
            }

            if let Err(err) = self.queue.del(&lease).await {
                warn!("[pipeline] lease release for {id} failed: {err}");
            }
        }
        collected
    }

    fn should_seal(&self, collected: usize) -> bool {
        if collected == 0 {
            return false;
        }
        if collected >= self.config.min_txs_per_block {
            return true;
        }
        let elapsed = self.clock.now() - *self.last_sealed_at.lock();
        elapsed >= Duration::milliseconds(self.config.block_time_ms as i64)
    }

    /// Seals the collected rows into the next block under one store
    /// transaction: insert block, bulk-flip PROCESSING -> CONFIRMED.
    async fn seal(&self, collected: &[LedgerTransaction]) -> Result<Block> {
        let candidates: Vec<SealCandidate> = collected
            .iter()
            .map(|row| SealCandidate { id: row.id, system_hash: row.system_hash.clone() })
            .collect();
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();

        let mut tx = self.store.begin().await?;
        let latest = tx.latest_block().await?;
        let block = assemble_block(latest.as_ref(), &candidates, self.clock.now());
        tx.insert_block(&block).await?;
        tx.confirm_transactions(&ids, block.id, block.height).await?;

        // Resolve endpoint addresses before commit so the cache
        // invalidation below needs no second transaction.
        let mut addresses = BTreeSet::new();
        for row in collected {
            for account_id in [row.from_account_id, row.to_account_id] {
                if let Some(account) = tx.account_by_id(account_id, LockMode::None).await? {
                    addresses.insert(account.system_address);
                }
            }
        }
        tx.commit().await?;

        for address in &addresses {
            if let Err(err) = self.queue.del(&balance_cache_key(address)).await {
                warn!("[sealer] balance cache invalidation for {address} failed: {err}");
            }
        }
        *self.last_sealed_at.lock() = self.clock.now();

        info!(
            "[sealer] sealed block #{} ({} txs, hash {})",
            block.height,
            collected.len(),
            &block.block_hash[..12]
        );
        Ok(block)
    }

    /// Pushes rows back to the queue head for a later cycle.
    async fn requeue(&self, rows: &[LedgerTransaction]) {
        for row in rows {
            if let Err(err) = self
                .queue
                .lpush(&self.config.mempool_list, &row.id.to_string())
                .await
            {
                // The row stays PROCESSING and block-less; the stuck-row
                // query is the operator's handle on it.
                error!("[pipeline] requeue of {} failed: {err}", row.system_hash);
            }
        }
    }

    /// Janitor sweep: re-enqueues PENDING rows older than twice the block
    /// time, closing the post-commit enqueue gap. Returns how many were
    /// re-enqueued.
    pub async fn sweep_orphans(&self) -> Result<usize> {
        let cutoff = self.clock.now() - Duration::milliseconds(self.config.stale_after_ms() as i64);
        let mut tx = self.store.begin().await?;
        let orphans = tx.pending_older_than(cutoff).await?;
        tx.commit().await?;

        let mut swept = 0;
        for row in &orphans {
            match self
                .queue
                .lpush(&self.config.mempool_list, &row.id.to_string())
                .await
            {
                Ok(_) => swept += 1,
                Err(err) => warn!("[janitor] re-enqueue of {} failed: {err}", row.system_hash),
            }
        }
        if swept > 0 {
            info!("[janitor] re-enqueued {swept} orphaned pending txs");
        }
        Ok(swept)
    }

    /// Recovery query: PROCESSING rows older than twice the block time
    /// with no block assignment. Exposed for operators, never auto-fixed.
    pub async fn stuck_transactions(&self) -> Result<Vec<LedgerTransaction>> {
        let cutoff = self.clock.now() - Duration::milliseconds(self.config.stale_after_ms() as i64);
        let mut tx = self.store.begin().await?;
        let rows = tx.processing_older_than(cutoff).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Spawns the periodic processor loop.
    pub fn spawn_processor(self: &Arc<Self>) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                "[pipeline] processor loop started (every {}ms, batch {})",
                pipeline.config.interval_ms, pipeline.config.batch_size
            );
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
                pipeline.config.interval_ms,
            ));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = pipeline.cycle().await {
                    error!("[pipeline] cycle failed: {err}");
                }
            }
        })
    }

    /// Spawns the periodic janitor sweep.
    pub fn spawn_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let period = std::time::Duration::from_millis(pipeline.config.stale_after_ms().max(1));
            info!("[janitor] sweep loop started (every {:?})", period);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = pipeline.sweep_orphans().await {
                    error!("[janitor] sweep failed: {err}");
                }
            }
        })
    }
}
