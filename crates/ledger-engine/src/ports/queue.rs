//! Durable queue and cache seam.
//!
//! A Redis-shaped collaborator: named FIFO lists with atomic push/pop,
//! `SET NX EX` leases, and a small expiring key/value space for cached
//! balance snapshots. Two lists matter to the pipeline: the mempool
//! (`tx:mempool`) and the dead-letter list (`tx:dead_letter`).
//!
//! Producers push with [`Queue::lpush`] (head side) and the processor
//! drains with [`Queue::rpop`] (tail side), so a list is FIFO end to end;
//! pushing a consumed id back with `lpush` re-delivers it after everything
//! currently queued.

use async_trait::async_trait;
use thiserror::Error;

/// Queue-layer failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The backend could not be reached or rejected the command.
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable FIFO lists, per-key leases, and the balance cache keyspace.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Pushes a value onto the head of a list; returns the new length.
    async fn lpush(&self, list: &str, value: &str) -> Result<u64, QueueError>;

    /// Pops a value from the tail of a list, if any.
    async fn rpop(&self, list: &str) -> Result<Option<String>, QueueError>;

    /// Current length of a list.
    async fn llen(&self, list: &str) -> Result<u64, QueueError>;

    /// `SET key value NX EX ttl`: acquires a lease iff the key is absent.
    /// Returns whether the lease was acquired.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, QueueError>;

    /// `SET key value EX ttl`: unconditional write with expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), QueueError>;

    /// Reads a key, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>, QueueError>;

    /// Deletes a key.
    async fn del(&self, key: &str) -> Result<(), QueueError>;
}
