//! Pipeline configuration.
//!
//! Every knob is environment-driven with a built-in default. A variable
//! that is present but unparseable refuses to load: a silently-wrong
//! processor cadence is worse than a crashed boot.

use std::env;
use thiserror::Error;
use uuid::Uuid;

/// TTL of a per-transaction execution lease, in seconds.
pub const LEASE_TTL_SECS: u64 = 60;

/// Key prefix for per-transaction leases.
pub const LEASE_KEY_PREFIX: &str = "lock:tx:";

/// Key prefix for cached balance snapshots.
pub const BALANCE_KEY_PREFIX: &str = "balance:";

/// Lease key for a transaction id.
pub fn tx_lease_key(tx_id: Uuid) -> String {
    format!("{LEASE_KEY_PREFIX}{tx_id}")
}

/// Cache key for an account's balance snapshot.
pub fn balance_cache_key(system_address: &str) -> String {
    format!("{BALANCE_KEY_PREFIX}{system_address}")
}

/// A configuration value that refuses to parse.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The named environment variable holds an unusable value.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Runtime configuration for the transaction pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Max ids popped from the mempool per cycle (`TX_PROCESSOR_BATCH_SIZE`).
    pub batch_size: usize,
    /// Force-seal interval in ms (`TX_PROCESSOR_BLOCK_TIME_MS`).
    pub block_time_ms: u64,
    /// Size-based seal threshold (`TX_PROCESSOR_MIN_TXS_PER_BLOCK`).
    pub min_txs_per_block: usize,
    /// Cycle cadence in ms (`TX_PROCESSOR_INTERVAL_MS`).
    pub interval_ms: u64,
    /// Mempool list key (`TX_MEMPOOL_NAME`).
    pub mempool_list: String,
    /// Dead-letter list key (`TX_DLQ_NAME`).
    pub dead_letter_list: String,
    /// Balance cache TTL in seconds (`CACHE_BALANCE_TTL_SECONDS`).
    pub balance_ttl_secs: u64,
    /// Whether this instance runs the processor loop (`RUN_TX_PROCESSOR`).
    pub run_processor: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            block_time_ms: 15_000,
            min_txs_per_block: 3,
            interval_ms: 5_000,
            mempool_list: "tx:mempool".to_string(),
            dead_letter_list: "tx:dead_letter".to_string(),
            balance_ttl_secs: 30,
            run_processor: false,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for absent variables and failing on unparseable ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            batch_size: parse_var("TX_PROCESSOR_BATCH_SIZE", defaults.batch_size)?,
            block_time_ms: parse_var("TX_PROCESSOR_BLOCK_TIME_MS", defaults.block_time_ms)?,
            min_txs_per_block: parse_var(
                "TX_PROCESSOR_MIN_TXS_PER_BLOCK",
                defaults.min_txs_per_block,
            )?,
            interval_ms: parse_var("TX_PROCESSOR_INTERVAL_MS", defaults.interval_ms)?,
            mempool_list: env::var("TX_MEMPOOL_NAME").unwrap_or(defaults.mempool_list),
            dead_letter_list: env::var("TX_DLQ_NAME").unwrap_or(defaults.dead_letter_list),
            balance_ttl_secs: parse_var("CACHE_BALANCE_TTL_SECONDS", defaults.balance_ttl_secs)?,
            run_processor: parse_bool("RUN_TX_PROCESSOR", defaults.run_processor)?,
        })
    }

    /// Aggressive timings for deterministic tests.
    pub fn for_testing() -> Self {
        Self {
            batch_size: 10,
            block_time_ms: 60_000,
            min_txs_per_block: 1,
            interval_ms: 50,
            balance_ttl_secs: 30,
            run_processor: true,
            ..Self::default()
        }
    }

    /// Janitor/recovery threshold: twice the force-seal interval.
    pub fn stale_after_ms(&self) -> u64 {
        self.block_time_ms.saturating_mul(2)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}
