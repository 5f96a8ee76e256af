//! SHA-256 helpers for content fingerprints and partition keys

use sha2::{Digest, Sha256};

/// Length of the hex partition prefix derived from an actor key
pub const PARTITION_KEY_LEN: usize = 16;

/// Hex-encoded SHA-256 of the input
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Stable, bounded-length partition key for an actor
pub fn partition_key(actor_key: &str) -> String {
    let mut hex = sha256_hex(actor_key.as_bytes());
    hex.truncate(PARTITION_KEY_LEN);
    hex
}
