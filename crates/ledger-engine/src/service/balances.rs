//! Cached balance reads.
//!
//! Snapshots live under `balance:{system_address}` with a configurable
//! TTL. The cache is only ever populated through an ownership-checked
//! load, and every mutation path (intake lock, sealing) invalidates the
//! affected addresses, so a hit is at most `balance_ttl_secs` stale and
//! never fabricated.

use crate::config::{balance_cache_key, PipelineConfig};
use crate::error::{EngineError, Result};
use crate::ports::{AccountStore, LockMode, Queue};
use ledger_types::BalanceSnapshot;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// User-scoped available/locked/total read path.
pub struct BalanceView {
    store: Arc<dyn AccountStore>,
    queue: Arc<dyn Queue>,
    config: PipelineConfig,
}

impl BalanceView {
    /// Creates the view.
    pub fn new(store: Arc<dyn AccountStore>, queue: Arc<dyn Queue>, config: PipelineConfig) -> Self {
        Self { store, queue, config }
    }

    /// Reads the balance of `system_address` on behalf of `user_id`.
    pub async fn balance_of(&self, user_id: Uuid, system_address: &str) -> Result<BalanceSnapshot> {
        let key = balance_cache_key(system_address);

        if let Some(json) = self.queue.get(&key).await? {
            match serde_json::from_str::<BalanceSnapshot>(&json) {
                Ok(snapshot) => {
                    debug!("[balances] cache hit for {system_address}");
                    return Ok(snapshot);
                }
                Err(err) => {
                    warn!("[balances] dropping undecodable cache entry for {system_address}: {err}");
                    self.queue.del(&key).await?;
                }
            }
        }

        let mut tx = self.store.begin().await?;
        let Some(account) = tx
            .account_owned_by(system_address, user_id, LockMode::None)
            .await?
        else {
            return Err(EngineError::Forbidden(format!(
                "account {system_address} is not visible to this user"
            )));
        };
        tx.commit().await?;

        let snapshot = BalanceSnapshot::of(&account);
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(err) = self
                    .queue
                    .set_ex(&key, &json, self.config.balance_ttl_secs)
                    .await
                {
                    warn!("[balances] cache write for {system_address} failed: {err}");
                }
            }
            Err(err) => warn!("[balances] snapshot for {system_address} did not serialize: {err}"),
        }
        Ok(snapshot)
    }
}
