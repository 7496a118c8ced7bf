//! Block commitments.
//!
//! All commitments are SHA-256 over UTF-8 text, hex-encoded lower-case.
//! The Merkle root commits to the *unordered set* of member transaction
//! hashes: inputs are sorted before hashing, so any permutation of the
//! same batch yields the same root and the same block hash. That keeps the
//! commitment insensitive to within-batch ordering, which a best-effort
//! FIFO drain does not guarantee.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Placeholder that stands in for the previous-block hash when sealing the
/// genesis block. Participates in hashing only; never stored.
pub const GENESIS_PREV_HASH: &str = "GENESIS_BLOCK_PREV_HASH_0000000000000";

/// SHA-256 of a UTF-8 string, hex-encoded lower-case.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// ISO-8601 projection of a timestamp as it enters the block hash:
/// millisecond precision, `Z` suffix.
pub fn hash_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Merkle root over a set of transaction hashes.
///
/// Leaves are the hash strings themselves, sorted ascending. Each level
/// pairs neighbours and hashes their concatenation; an odd node count
/// duplicates the last element. A single-element level is the root, so a
/// one-transaction block's root is that transaction's hash. The empty set
/// commits to `SHA256("")`.
pub fn merkle_root(system_hashes: &[String]) -> String {
    if system_hashes.is_empty() {
        return sha256_hex("");
    }

    let mut level: Vec<String> = system_hashes.to_vec();
    level.sort();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(sha256_hex(&format!("{left}{right}")));
        }
        level = next;
    }

    level.remove(0)
}

/// Block hash preimage: `height || iso-timestamp || prev-or-genesis ||
/// concatenated sorted transaction hashes`.
pub fn block_hash(
    height: u64,
    timestamp: DateTime<Utc>,
    previous_block_hash: Option<&str>,
    sorted_hashes: &[String],
) -> String {
    let prev = previous_block_hash.unwrap_or(GENESIS_PREV_HASH);
    let joined: String = sorted_hashes.concat();
    sha256_hex(&format!(
        "{height}{}{prev}{joined}",
        hash_timestamp(timestamp)
    ))
}
