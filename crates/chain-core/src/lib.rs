//! Proof-of-work block primitives.
//!
//! This crate provides pure Rust implementations of:
//! - Canonical little-endian / compact-size encoding into byte sinks
//! - SHA256 double-hashing
//! - Transaction serialization with optional segregated witness data
//! - Merkle roots, inclusion paths and proofs over transaction ids
//! - Block header serialization and bounded nonce search

pub mod block;
pub mod codec;
pub mod config;
pub mod consts;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod mining;
pub mod transaction;

pub use block::{Block, BlockHeader};
pub use codec::{ByteSink, Encodable};
pub use config::MiningLimits;
pub use difficulty::{bits_to_target, hash_meets_target, target_with_leading_zero_bits};
pub use error::{BlockError, ChainError, ConfigError, MerkleError, Result, TransactionError};
pub use hash::{double_sha256, hash_concat, Hash256};
pub use merkle::{compute_merkle_root, merkle_path, verify_merkle_path, MerklePathItem, MerkleProof, MerkleTree};
pub use mining::{mine_header, mine_range, BatchResult, Clock, MinedHeader, MiningOutcome, SystemClock};
pub use transaction::{OutPoint, Transaction, TxIn, TxOut, Txid, Witness};
