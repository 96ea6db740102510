//! Error types for the block primitives.
//!
//! Mining running out of time or nonces is not an error; see
//! [`crate::mining::MiningOutcome`].

use thiserror::Error;

/// Failures of the Merkle engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("transaction index {index} out of range for {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A transaction whose segwit marker/flag disagree with its witness data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid marker {marker:#04x} and flag {flag:#04x} (witness data present: {segwit})")]
    InconsistentSegwitFlags { segwit: bool, marker: u8, flag: u8 },
}

/// Lookups against the transactions of a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("transaction {0} not found in block")]
    TransactionNotFound(String),

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// Configuration parsing failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid mining configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any error raised by this crate.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;
