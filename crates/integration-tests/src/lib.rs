//! # Integration Tests Crate
//!
//! End-to-end coverage of the transaction pipeline over the in-memory
//! adapters with a deterministic clock.
//!
//! ## Structure
//!
//! ```text
//! integration-tests/
//! └── src/
//!     ├── lib.rs              # This file
//!     ├── fixtures.rs         # Shared harness and account seeding
//!     ├── transfer_flow.rs    # Submission -> execution -> sealing flows
//!     └── chain_properties.rs # Quantified ledger & chain invariants
//! ```
//!
//! ## Transfer Flows (transfer_flow.rs)
//!
//! - Happy-path transfer: reserve, execute, seal at height 0
//! - Insufficient funds and concurrent double-spend rejection
//! - Size-based and time-based sealing thresholds
//! - Chain linkage across consecutive blocks
//! - Janitor recovery of orphaned PENDING rows
//!
//! ## Ledger & Chain Properties (chain_properties.rs)
//!
//! - Conservation: transfers never change a currency's total supply
//! - Lock discipline: `balance >= locked >= 0` at every observation point
//! - Gapless heights and parent-hash linkage over the whole chain
//! - Stored block hash and Merkle root recompute exactly from stored rows
//! - At-most-once confirmation and executor idempotency
//! - Strictly increasing per-account nonces

pub mod fixtures;

#[cfg(test)]
mod chain_properties;
#[cfg(test)]
mod transfer_flow;
