//! # Ledger Wallet Engine - Transaction Pipeline & Block Builder
//!
//! Maintains a double-entry ledger over user-owned, currency-scoped
//! accounts and commits confirmed transfers into a hash-linked,
//! append-only chain of blocks.
//!
//! ## Pipeline
//!
//! ```text
//! client ──▶ TransferIntake ──▶ Queue (tx:mempool) ──▶ PipelineLoop
//!              reserve funds,                            pop batch,
//!              insert PENDING                            lease per id
//!                                                           │
//!                                   TransactionExecutor ◀───┘
//!                                     debit/credit, row ▶ PROCESSING
//!                                                           │
//!                                   seal condition met ─────┤
//!                                                           ▼
//!                                   BlockBuilder: height, prev-hash link,
//!                                   Merkle root ▶ rows flipped CONFIRMED
//! ```
//!
//! ## Architecture Layers
//!
//! - [`domain`]: pure logic (hashing, Merkle commitment, block assembly,
//!   balance invariants). No IO.
//! - [`ports`]: the three collaborator seams the core consumes:
//!   [`ports::AccountStore`], [`ports::Queue`], [`ports::Clock`].
//! - [`adapters`]: in-memory reference implementations of the ports.
//! - [`service`]: the driving services: intake, executor, pipeline loop,
//!   balance view, account origination.
//!
//! ## Critical Invariants
//!
//! 1. **Conservation**: transfers never change the total supply of a
//!    currency across accounts.
//! 2. **Lock discipline**: `balance >= locked >= 0` for every account at
//!    every commit point.
//! 3. **Chain integrity**: block heights are gapless and every non-genesis
//!    block links to its parent's hash.
//! 4. **At-least-once execution**: intake and executor communicate only
//!    through the durable queue; a crashed cycle is retried after the
//!    per-transaction lease expires.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

mod config;
mod error;

pub use config::{
    balance_cache_key, tx_lease_key, ConfigError, PipelineConfig, BALANCE_KEY_PREFIX,
    LEASE_KEY_PREFIX, LEASE_TTL_SECS,
};
pub use error::{EngineError, Result};
pub use service::{
    AccountService, BalanceView, LedgerEngine, TransactionExecutor, TransactionPipeline,
    TransferIntake, TransferReceipt,
};
