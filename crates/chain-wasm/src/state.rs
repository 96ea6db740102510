//! Session state and the plain-data views handed to JavaScript.

use chain_core::{
    difficulty::{expected_hashes, format_difficulty, leading_zero_bits, target_difficulty},
    hash::to_display_hex,
    Block, Hash256, MiningOutcome,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Where a mining session stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No batch has run since the block last changed.
    #[default]
    Idle,
    Searching,
    Found,
    /// The time budget ran out; `start` resumes from the next nonce.
    TimedOut,
    NonceExhausted,
}

impl SessionState {
    /// True once no further batch can change the outcome.
    pub fn is_final(&self) -> bool {
        matches!(self, SessionState::Found | SessionState::NonceExhausted)
    }
}

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningStats {
    /// Total hashes computed.
    pub total_hashes: u64,
    /// Current hash rate (hashes per second).
    pub hash_rate: f64,
    pub state: SessionState,
    /// Next nonce to be tried.
    pub current_nonce: u32,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Best hash found (lowest), hex in internal byte order.
    pub best_hash: Option<String>,
    /// Number of leading zero bits in the best hash.
    pub best_leading_zero_bits: u32,
}

impl MiningStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Record a candidate for the best hash.
    pub fn record_best(&mut self, hash: &Hash256) {
        self.best_hash = Some(hex::encode(hash));
        self.best_leading_zero_bits = leading_zero_bits(hash);
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Block information for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Previous block hash, hex in internal byte order.
    pub prev_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub target: String,
    /// Difficulty relative to the reference target.
    pub difficulty: f64,
    /// Formatted difficulty string.
    pub difficulty_display: String,
    /// Average number of hashes needed to meet the target.
    pub expected_hashes: f64,
    pub transaction_count: usize,
    /// Header hash in display (reversed) order, for logs and explorers.
    pub header_hash: String,
}

impl BlockSummary {
    pub fn from_block(block: &Block) -> Self {
        let header = &block.header;
        let difficulty = target_difficulty(&header.target);

        BlockSummary {
            prev_hash: hex::encode(header.prev_block_hash),
            merkle_root: hex::encode(header.merkle_root),
            timestamp: header.timestamp,
            target: hex::encode(header.target),
            difficulty,
            difficulty_display: format_difficulty(difficulty),
            expected_hashes: expected_hashes(&header.target),
            transaction_count: block.transactions.len(),
            header_hash: to_display_hex(&header.hash()),
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Result of a mining operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningResultInfo {
    /// Session state after the batch.
    pub status: SessionState,
    /// The winning nonce (if found).
    pub nonce: Option<u32>,
    /// The header hash (if found), hex in internal byte order.
    pub hash: Option<String>,
    /// Number of leading zero bits in the winning hash.
    pub leading_zero_bits: u32,
    /// Hashes computed in this batch.
    pub hashes_computed: u64,
    /// Nonce the next batch starts from.
    pub next_nonce: u32,
}

impl MiningResultInfo {
    /// Summarize a blocking run that stopped at `next_nonce`.
    pub fn from_outcome(outcome: &MiningOutcome, next_nonce: u32) -> Self {
        let status = match outcome {
            MiningOutcome::Found(_) => SessionState::Found,
            MiningOutcome::TimedOut { .. } => SessionState::TimedOut,
            MiningOutcome::NonceExhausted { .. } => SessionState::NonceExhausted,
        };
        let mined = outcome.mined();

        MiningResultInfo {
            status,
            nonce: mined.map(|m| m.header.nonce),
            hash: mined.map(|m| hex::encode(m.hash)),
            leading_zero_bits: mined.map_or(0, |m| leading_zero_bits(&m.hash)),
            hashes_computed: outcome.attempts(),
            next_nonce,
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}
