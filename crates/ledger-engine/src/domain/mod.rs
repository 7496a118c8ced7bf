//! Pure domain logic: no IO, no clocks, no stores.

mod assembler;
mod hashing;
mod invariants;

pub use assembler::{assemble_block, SealCandidate};
pub use hashing::{block_hash, hash_timestamp, merkle_root, sha256_hex, GENESIS_PREV_HASH};
pub use invariants::{release_lock, reserve_funds, settle_transfer, SettleError};
