//! Stable identifiers derived from channel addresses

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Deterministic user id for a channel address.
///
/// The same address always maps to the same UUID, so a user record can be
/// re-derived without a lookup table.
pub fn stable_user_id(identifier: &str) -> Uuid {
    let hash = Sha256::digest(identifier.trim().as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Short tag used in logs in place of the raw address.
pub fn log_tag(identifier: &str) -> String {
    let hash = Sha256::digest(identifier.trim().as_bytes());
    hex::encode(&hash[..6])
}
