//! Opaque external handles.
//!
//! Rows are keyed internally by UUID; the handles below are what leaves the
//! system. Both carry 16 random bytes hex-encoded behind a short prefix.

use rand::RngCore;

/// Prefix of external account addresses.
pub const ACCOUNT_ADDRESS_PREFIX: &str = "acc_";

/// Prefix of external transaction hashes.
pub const TX_HASH_PREFIX: &str = "txn_";

fn random_hex_16() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a fresh `acc_<32-hex>` account address.
pub fn new_system_address() -> String {
    format!("{ACCOUNT_ADDRESS_PREFIX}{}", random_hex_16())
}

/// Generates a fresh `txn_<32-hex>` transaction hash.
pub fn new_system_hash() -> String {
    format!("{TX_HASH_PREFIX}{}", random_hex_16())
}
