//! SHA256 double-hashing primitives.
//!
//! Every digest in the crate (transaction ids, Merkle nodes, header hashes)
//! goes through [`double_sha256`] or [`hash_concat`].

use sha2::{Digest, Sha256};

/// A 32-byte digest in internal byte order.
pub type Hash256 = [u8; 32];

/// The all-zero digest. Root of an empty Merkle tree.
pub const ZERO_HASH: Hash256 = [0u8; 32];

/// Double SHA256: SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Double SHA256 of an input that may be absent.
///
/// An absent input hashes to [`ZERO_HASH`]; an empty slice does not.
pub fn double_sha256_optional(data: Option<&[u8]>) -> Hash256 {
    match data {
        Some(bytes) => double_sha256(bytes),
        None => ZERO_HASH,
    }
}

/// Hash two nodes together: `double_sha256(left || right)`.
#[inline]
pub fn hash_concat(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    double_sha256(&combined)
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> Hash256 {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// Reverse the byte order of a 32-byte array.
#[inline]
pub fn reverse_bytes(bytes: &Hash256) -> Hash256 {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Render a hash the way block explorers do (reversed hex).
pub fn to_display_hex(hash: &Hash256) -> String {
    hex::encode(reverse_bytes(hash))
}

/// Parse a reversed-hex (display order) hash back into internal order.
pub fn from_display_hex(s: &str) -> Option<Hash256> {
    let bytes = hex::decode(s).ok()?;
    let hash: Hash256 = bytes.try_into().ok()?;
    Some(reverse_bytes(&hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");

        let expected = hex::decode(
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        ).unwrap();

        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_double_sha256_is_pure() {
        assert_eq!(double_sha256(b"block"), double_sha256(b"block"));
        assert_ne!(double_sha256(b"block"), double_sha256(b"blocK"));
    }

    #[test]
    fn test_double_sha256_of_empty_input() {
        // SHA256d("") is not the zero hash
        let expected = hex::decode(
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        ).unwrap();
        assert_eq!(double_sha256(&[]).as_slice(), expected.as_slice());
        assert_eq!(double_sha256_optional(Some(&[])).as_slice(), expected.as_slice());
        assert_eq!(double_sha256_optional(None), ZERO_HASH);
    }

    #[test]
    fn test_hash_concat_order() {
        let a = [0x11u8; 32];
        let b = [0x22u8; 32];

        let mut combined = Vec::with_capacity(64);
        combined.extend_from_slice(&a);
        combined.extend_from_slice(&b);

        assert_eq!(hash_concat(&a, &b), double_sha256(&combined));
        assert_ne!(hash_concat(&a, &b), hash_concat(&b, &a));
    }

    #[test]
    fn test_sha256() {
        let expected = hex::decode(
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        ).unwrap();
        assert_eq!(sha256(b"hello").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_display_hex_roundtrip() {
        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        hash[31] = 0xff;

        let display = to_display_hex(&hash);
        assert!(display.starts_with("ff"));
        assert!(display.ends_with("01"));
        assert_eq!(from_display_hex(&display), Some(hash));

        assert_eq!(from_display_hex("abcd"), None);
        assert_eq!(from_display_hex("zz"), None);
    }
}
