//! Consensus-layout constants shared by the encoders and the miner.

/// Default block header version.
pub const BLOCK_VERSION: u32 = 1;

/// Size of a serialized block header in bytes.
///
/// `version(4) | prev_block_hash(32) | merkle_root(32) | timestamp(4) | target(32) | nonce(4)`
pub const BLOCK_HEADER_SIZE: usize = 108;

/// Byte offset of the nonce inside a serialized header.
pub const NONCE_OFFSET: usize = BLOCK_HEADER_SIZE - 4;

/// Size of a hash, transaction id, Merkle node or target.
pub const HASH_SIZE: usize = 32;

/// Segregated witness marker byte. Must be zero.
pub const SEGWIT_MARKER: u8 = 0x00;

/// Segregated witness flag byte. Must be one.
pub const SEGWIT_FLAG: u8 = 0x01;

/// Compact-size prefix for a 2-byte length.
pub const COMPACT_SIZE_U16: u8 = 0xfd;

/// Compact-size prefix for a 4-byte length.
pub const COMPACT_SIZE_U32: u8 = 0xfe;

/// Compact-size prefix for an 8-byte length.
pub const COMPACT_SIZE_U64: u8 = 0xff;

/// Default wall-clock bound for a mining run (ten minutes, one block interval).
pub const DEFAULT_MINING_TIME_LIMIT_MS: u64 = 600_000;

/// Default number of nonces hashed between two clock reads.
pub const DEFAULT_MINING_BATCH_SIZE: u32 = 65_536;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(BLOCK_HEADER_SIZE, 4 + HASH_SIZE + HASH_SIZE + 4 + HASH_SIZE + 4);
        assert_eq!(NONCE_OFFSET, 104);
    }
}
