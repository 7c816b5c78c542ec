//! Content hash of grid definition sections.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of the raw GDS bytes truncated to 64 bits.
///
/// Two grid definitions are the same grid exactly when their bytes are
/// equal; the truncated hash is only a key and every intern compares bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GdsHash(pub u64);

impl GdsHash {
    pub fn of(raw: &[u8]) -> Self {
        let digest = Sha256::digest(raw);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(head))
    }
}

impl fmt::Display for GdsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_content_based() {
        assert_eq!(GdsHash::of(b"abc"), GdsHash::of(b"abc"));
        assert_ne!(GdsHash::of(b"abc"), GdsHash::of(b"abd"));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256("abc") = ba7816bf8f01cfea...
        assert_eq!(GdsHash::of(b"abc").to_string(), "ba7816bf8f01cfea");
    }
}
