//! Block assembly.
//!
//! Pure computation of the next block from the current chain tip and a
//! batch of confirmed-to-be transactions; inserting the result and
//! flipping the rows is the sealer's job.

use super::hashing::{block_hash, merkle_root};
use chrono::{DateTime, Utc};
use ledger_types::Block;
use uuid::Uuid;

/// One transaction headed into a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealCandidate {
    /// Transaction row id.
    pub id: Uuid,
    /// External `txn_<hex>` handle entering the commitment.
    pub system_hash: String,
}

/// Computes the block that extends `latest` with `candidates`.
///
/// Height is `latest.height + 1`, or 0 for an empty chain; the
/// previous-hash link is `latest.block_hash`. Candidate hashes are sorted
/// before both commitments, so batch order does not affect the result.
pub fn assemble_block(
    latest: Option<&Block>,
    candidates: &[SealCandidate],
    sealed_at: DateTime<Utc>,
) -> Block {
    let height = latest.map_or(0, |b| b.height + 1);
    let previous_block_hash = latest.map(|b| b.block_hash.clone());

    let mut hashes: Vec<String> = candidates.iter().map(|c| c.system_hash.clone()).collect();
    hashes.sort();

    let merkle = merkle_root(&hashes);
    let hash = block_hash(height, sealed_at, previous_block_hash.as_deref(), &hashes);

    Block {
        id: Uuid::new_v4(),
        height,
        block_hash: hash,
        previous_block_hash,
        timestamp: sealed_at,
        merkle_root: merkle,
    }
}
