//! # Ledger Wallet Engine - Shared Domain Types
//!
//! Entities shared by every crate in the workspace:
//!
//! - **Money**: [`Amount`], a fixed-point value at 8 fractional digits held
//!   in integer minor units. Balances never touch floating point.
//! - **Accounts**: [`Wallet`], [`Account`] and the opaque external handles
//!   (`acc_<hex>` addresses, `txn_<hex>` transaction hashes).
//! - **Transfers**: [`LedgerTransaction`] and the [`TxStatus`] state machine.
//! - **Chain**: [`Block`], a height-ordered, hash-linked commitment over a
//!   batch of confirmed transactions.
//!
//! ## Core Invariants
//!
//! 1. **Lock discipline**: for every account, `balance >= locked >= 0`.
//! 2. **Status lattice**: `PENDING -> PROCESSING -> CONFIRMED`, with
//!    `FAILED` reachable from both non-terminal states. Terminal states
//!    never transition again.
//! 3. **Chain linkage**: every non-genesis block's `previous_block_hash`
//!    equals the prior block's `block_hash`; heights are gapless.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod amount;
mod entities;
mod handles;

pub use amount::{Amount, AmountError, FRACTIONAL_DIGITS};
pub use entities::{
    Account, BalanceSnapshot, Block, Currency, CurrencyError, LedgerTransaction, StatusError,
    TxKind, TxStatus, Wallet,
};
pub use handles::{new_system_address, new_system_hash, ACCOUNT_ADDRESS_PREFIX, TX_HASH_PREFIX};
