//! Driving services: intake, executor, pipeline loop, balance view and
//! account origination, plus the [`LedgerEngine`] facade that wires them
//! over one set of collaborators.

mod accounts;
mod balances;
mod executor;
mod intake;
mod pipeline;

pub use accounts::AccountService;
pub use balances::BalanceView;
pub use executor::TransactionExecutor;
pub use intake::{TransferIntake, TransferReceipt};
pub use pipeline::TransactionPipeline;

use crate::config::PipelineConfig;
use crate::ports::{AccountStore, Clock, Queue};
use std::sync::Arc;

/// All engine services assembled over one store, queue and clock.
pub struct LedgerEngine {
    /// Account origination and transaction visibility.
    pub accounts: AccountService,
    /// Transfer submission (C4).
    pub intake: TransferIntake,
    /// Lease-guarded single-transaction execution (C5).
    pub executor: TransactionExecutor,
    /// Cycle orchestration, sealing and recovery (C6 + C3).
    pub pipeline: Arc<TransactionPipeline>,
    /// Cached balance reads (C7).
    pub balances: BalanceView,
}

impl LedgerEngine {
    /// Wires every service over the given collaborators.
    pub fn new(
        store: Arc<dyn AccountStore>,
        queue: Arc<dyn Queue>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            intake: TransferIntake::new(
                Arc::clone(&store),
                Arc::clone(&queue),
                Arc::clone(&clock),
                config.clone(),
            ),
            executor: TransactionExecutor::new(
                Arc::clone(&store),
                Arc::clone(&queue),
                config.clone(),
            ),
            balances: BalanceView::new(
                Arc::clone(&store),
                Arc::clone(&queue),
                config.clone(),
            ),
            pipeline: Arc::new(TransactionPipeline::new(store, queue, clock, config)),
        }
    }
}
