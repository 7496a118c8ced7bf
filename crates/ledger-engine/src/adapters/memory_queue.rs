//! In-memory [`Queue`].
//!
//! Lists are `VecDeque`s and the lease/cache keyspace is a map with
//! clock-evaluated expiries, so tests drive TTLs with a mock clock instead
//! of sleeping.

use crate::ports::{Clock, Queue, QueueError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct KvEntry {
    value: String,
    expires_at_ms: Option<i64>,
}

#[derive(Default)]
struct QueueState {
    lists: HashMap<String, VecDeque<String>>,
    kv: HashMap<String, KvEntry>,
}

/// Deterministic in-memory queue and cache.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn Clock>,
    fail_pushes: AtomicBool,
}

impl MemoryQueue {
    /// Creates an empty queue reading expiries from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
            fail_pushes: AtomicBool::new(false),
        }
    }

    /// Fault injection: while enabled, every `lpush` fails, simulating a
    /// broker outage between a store commit and its enqueue.
    pub fn fail_pushes(&self, enabled: bool) {
        self.fail_pushes.store(enabled, Ordering::SeqCst);
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn purge_if_expired(state: &mut QueueState, key: &str, now_ms: i64) {
        let expired = state
            .kv
            .get(key)
            .and_then(|e| e.expires_at_ms)
            .is_some_and(|at| at <= now_ms);
        if expired {
            state.kv.remove(key);
        }
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn lpush(&self, list: &str, value: &str) -> Result<u64, QueueError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("injected push failure".into()));
        }
        let mut state = self.state.lock();
        let entries = state.lists.entry(list.to_string()).or_default();
        entries.push_front(value.to_string());
        Ok(entries.len() as u64)
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>, QueueError> {
        let mut state = self.state.lock();
        Ok(state.lists.get_mut(list).and_then(|entries| entries.pop_back()))
    }

    async fn llen(&self, list: &str) -> Result<u64, QueueError> {
        let state = self.state.lock();
        Ok(state.lists.get(list).map_or(0, |entries| entries.len() as u64))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, QueueError> {
        let now_ms = self.now_ms();
        let mut state = self.state.lock();
        Self::purge_if_expired(&mut state, key, now_ms);
        if state.kv.contains_key(key) {
            return Ok(false);
        }
        state.kv.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at_ms: Some(now_ms + (ttl_secs as i64) * 1_000),
            },
        );
        Ok(true)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), QueueError> {
        let now_ms = self.now_ms();
        let mut state = self.state.lock();
        state.kv.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at_ms: Some(now_ms + (ttl_secs as i64) * 1_000),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        let now_ms = self.now_ms();
        let mut state = self.state.lock();
        Self::purge_if_expired(&mut state, key, now_ms);
        Ok(state.kv.get(key).map(|e| e.value.clone()))
    }

    async fn del(&self, key: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        state.kv.remove(key);
        Ok(())
    }
}
