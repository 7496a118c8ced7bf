//! Ledger node runtime.
//!
//! Loads configuration from the environment, wires the engine over the
//! reference adapters and, when `RUN_TX_PROCESSOR=true`, runs the
//! processor and janitor loops until interrupted. Bad configuration
//! refuses to start.

use ledger_engine::adapters::{MemoryQueue, MemoryStore};
use ledger_engine::ports::{AccountStore, Clock, Queue, SystemClock};
use ledger_engine::{LedgerEngine, PipelineConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("[node] refusing to start: {err}");
            std::process::exit(1);
        }
    };
    info!(
        "[node] starting (batch {}, block time {}ms, min {} txs, cycle {}ms)",
        config.batch_size, config.block_time_ms, config.min_txs_per_block, config.interval_ms
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn AccountStore> = Arc::new(MemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new(Arc::clone(&clock)));
    let run_processor = config.run_processor;
    let engine = LedgerEngine::new(store, queue, clock, config);

    let mut handles = Vec::new();
    if run_processor {
        handles.push(engine.pipeline.spawn_processor());
        handles.push(engine.pipeline.spawn_janitor());
    } else {
        info!("[node] transaction processor disabled (RUN_TX_PROCESSOR=false)");
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("[node] shutdown signal listener failed: {err}");
    }
    info!("[node] shutting down");
    for handle in handles {
        handle.abort();
    }
}
