//! Mining controller for the WASM build.

use std::time::Duration;

use chain_core::{
    bits_to_target, target_with_leading_zero_bits, Block, Clock, Hash256, MerkleProof, MiningLimits,
    Transaction,
};
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::session::MiningSession;
use crate::state::{BlockSummary, MiningResultInfo, SessionState};

/// [`Clock`] reading `Date.now()`; `Instant` is unavailable in the browser.
struct DateClock;

impl Clock for DateClock {
    fn now(&self) -> Duration {
        Duration::from_millis(js_sys::Date::now() as u64)
    }
}

/// Parse a 32-byte hash given as hex in internal byte order.
pub fn decode_hash(hex_str: &str) -> Result<Hash256, String> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| format!("Invalid hash hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| format!("Hash must be 32 bytes, got {}", bytes.len()))
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

/// The main mining controller.
#[wasm_bindgen]
pub struct Miner {
    /// Limits applied to every block this miner works on.
    limits: MiningLimits,
    /// The block being mined, with its search progress.
    session: Option<MiningSession>,
    /// Whether mining is active.
    is_mining: bool,
}

impl Miner {
    fn session(&self) -> Result<&MiningSession, JsValue> {
        self.session.as_ref().ok_or_else(|| js_error("No block built"))
    }

    fn session_mut(&mut self) -> Result<&mut MiningSession, JsValue> {
        self.session.as_mut().ok_or_else(|| js_error("No block built"))
    }
}

#[wasm_bindgen]
impl Miner {
    /// Create a new miner instance.
    ///
    /// # Arguments
    /// * `limits` - `{ time_limit_ms, nonce_limit, batch_size }`, any field may
    ///   be omitted; `undefined` uses the defaults
    #[wasm_bindgen(constructor)]
    pub fn new(limits: JsValue) -> Result<Miner, JsValue> {
        let limits = if limits.is_undefined() || limits.is_null() {
            MiningLimits::default()
        } else {
            serde_wasm_bindgen::from_value(limits)
                .map_err(|e| js_error(format!("Invalid limits: {}", e)))?
        };

        Ok(Miner::with_limits(limits))
    }

    /// Create a miner from a JSON limits document.
    #[wasm_bindgen]
    pub fn from_config_json(json: &str) -> Result<Miner, JsValue> {
        let limits = MiningLimits::from_json(json).map_err(js_error)?;
        Ok(Miner::with_limits(limits))
    }

    /// Start a new, empty block on top of `prev_hash`.
    ///
    /// # Arguments
    /// * `prev_hash` - The previous block hash (hex, internal byte order)
    /// * `target` - The 32-byte target (hex, big-endian)
    /// * `timestamp` - The block timestamp (or 0 to use current time)
    #[wasm_bindgen]
    pub fn new_block(&mut self, prev_hash: &str, target: &str, timestamp: u32) -> Result<JsValue, JsValue> {
        let prev_block_hash = decode_hash(prev_hash).map_err(js_error)?;
        let target = decode_hash(target).map_err(js_error)?;

        let ts = if timestamp > 0 {
            timestamp
        } else {
            (js_sys::Date::now() / 1000.0) as u32
        };

        let block = Block::assemble(prev_block_hash, ts, target, Vec::new());
        let summary = BlockSummary::from_block(&block);

        self.session = Some(MiningSession::new(block, self.limits));
        self.is_mining = false;
        debug!(timestamp = ts, "new block");

        summary.to_js()
    }

    /// Append a transaction to the block and restart the search.
    ///
    /// Takes a transaction object with hex-encoded scripts and witness items.
    /// Returns the transaction id (hex, internal byte order).
    #[wasm_bindgen]
    pub fn add_transaction(&mut self, tx: JsValue) -> Result<String, JsValue> {
        let tx: Transaction = serde_wasm_bindgen::from_value(tx)
            .map_err(|e| js_error(format!("Invalid transaction: {}", e)))?;
        let txid = self.session_mut()?.add_transaction(tx);
        Ok(hex::encode(txid))
    }

    /// Number of transactions in the block.
    #[wasm_bindgen(getter)]
    pub fn transaction_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.block().transactions.len())
    }

    /// The header's Merkle root (hex, internal byte order).
    #[wasm_bindgen]
    pub fn merkle_root(&self) -> Result<String, JsValue> {
        Ok(hex::encode(self.session()?.block().header.merkle_root))
    }

    /// Describe the current block.
    #[wasm_bindgen]
    pub fn block_summary(&self) -> Result<JsValue, JsValue> {
        BlockSummary::from_block(self.session()?.block()).to_js()
    }

    /// Mine a batch of nonces.
    ///
    /// # Arguments
    /// * `batch_size` - Number of nonces to try in this batch
    ///
    /// # Returns
    /// The session state after the batch and, if found, the winning nonce.
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let now = js_sys::Date::now();
        let info = self.session_mut()?.step(batch_size, now);

        if info.status != SessionState::Searching {
            self.is_mining = false;
        }
        info.to_js()
    }

    /// Mine until a nonce is found or a limit is reached.
    ///
    /// Blocks the calling thread; run it in a worker.
    #[wasm_bindgen]
    pub fn mine(&mut self) -> Result<JsValue, JsValue> {
        let session = self.session_mut()?;
        let outcome = session.run_to_completion(&DateClock);
        let info = MiningResultInfo::from_outcome(&outcome, session.next_nonce());

        self.is_mining = false;
        info.to_js()
    }

    /// Inclusion proof for a transaction id (hex, internal byte order).
    #[wasm_bindgen]
    pub fn merkle_proof(&self, txid: &str) -> Result<JsValue, JsValue> {
        let txid = decode_hash(txid).map_err(js_error)?;
        let proof = self.session()?.block().merkle_proof(&txid).map_err(js_error)?;

        serde_wasm_bindgen::to_value(&proof)
            .map_err(|e| js_error(format!("Serialization error: {:?}", e)))
    }

    /// Check that a transaction is committed to by the current header.
    #[wasm_bindgen]
    pub fn verify_transaction(&self, txid: &str) -> Result<bool, JsValue> {
        let txid = decode_hash(txid).map_err(js_error)?;
        self.session()?.block().verify_transaction(&txid).map_err(js_error)
    }

    /// Check a proof produced by [`Miner::merkle_proof`] against a Merkle root.
    #[wasm_bindgen]
    pub fn verify_proof(proof: JsValue, merkle_root: &str) -> Result<bool, JsValue> {
        let proof: MerkleProof = serde_wasm_bindgen::from_value(proof)
            .map_err(|e| js_error(format!("Invalid proof: {}", e)))?;
        let root = decode_hash(merkle_root).map_err(js_error)?;
        Ok(proof.verify_against(&root))
    }

    /// The serialized header, hex encoded.
    #[wasm_bindgen]
    pub fn header_hex(&self) -> Result<String, JsValue> {
        Ok(hex::encode(self.session()?.block().header.serialize()))
    }

    /// Get the serialized block (if a valid nonce was found).
    #[wasm_bindgen]
    pub fn get_block_hex(&self) -> Option<String> {
        self.session
            .as_ref()
            .filter(|s| s.state() == SessionState::Found)
            .map(|s| hex::encode(s.block().serialize()))
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&mut self) -> Result<(), JsValue> {
        let now = js_sys::Date::now();
        self.session_mut()?.start(now);
        self.is_mining = true;
        Ok(())
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&mut self) {
        self.is_mining = false;
    }

    /// Check if mining is active.
    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    /// Get current mining statistics.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.session()?.stats().to_js()
    }

    /// Get the formatted hash rate.
    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.session
            .as_ref()
            .map_or_else(|| "0.00 H/s".to_string(), |s| s.stats().format_hash_rate())
    }

    /// Discard search progress on the current block.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset_search();
        }
        self.is_mining = false;
    }
}

impl Miner {
    pub fn with_limits(limits: MiningLimits) -> Self {
        Miner {
            limits,
            session: None,
            is_mining: false,
        }
    }

    pub fn limits(&self) -> &MiningLimits {
        &self.limits
    }
}

/// Target accepting hashes with at least `zero_bits` leading zero bits (hex).
#[wasm_bindgen]
pub fn target_for_zero_bits(zero_bits: u32) -> String {
    hex::encode(target_with_leading_zero_bits(zero_bits))
}

/// Expand compact difficulty bits into a target (hex).
#[wasm_bindgen]
pub fn target_from_bits(bits: u32) -> String {
    hex::encode(bits_to_target(bits))
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hash() {
        let hash = decode_hash(&"ab".repeat(32)).unwrap();
        assert_eq!(hash, [0xab; 32]);

        let err = decode_hash("abcd").unwrap_err();
        assert!(err.contains("32 bytes"), "{}", err);
        assert!(decode_hash("zz").is_err());
    }

    #[test]
    fn test_target_helpers() {
        assert_eq!(target_for_zero_bits(8), format!("01{}", "00".repeat(31)));
        assert_eq!(&target_from_bits(0x1d00ffff)[..12], "00000000ffff");
    }

    #[test]
    fn test_miner_without_block() {
        let miner = Miner::with_limits(MiningLimits::default().with_batch_size(10));
        assert_eq!(miner.transaction_count(), 0);
        assert_eq!(miner.get_block_hex(), None);
        assert_eq!(miner.get_hash_rate_display(), "0.00 H/s");
        assert_eq!(miner.limits().batch_size, 10);
    }
}
