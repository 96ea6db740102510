//! Nonce search.
//!
//! A run moves from searching to exactly one terminal state: a nonce was
//! found, the time budget ran out, or the nonce space up to the configured
//! limit was exhausted. Running out is not an error; callers inspect the
//! [`MiningOutcome`] and retry with a new timestamp or transaction set.

use std::time::{Duration, Instant};

use tracing::{info, trace, warn};

use crate::block::BlockHeader;
use crate::config::MiningLimits;
use crate::consts::{BLOCK_HEADER_SIZE, NONCE_OFFSET};
use crate::difficulty::hash_meets_target;
use crate::hash::{double_sha256, to_display_hex, Hash256};

/// Monotonic time source for the mining time limit.
///
/// `now` returns the time elapsed since an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
///
/// Not usable on `wasm32-unknown-unknown`, where `Instant::now` panics.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Result of hashing one contiguous range of nonces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// The nonce that satisfied the target (if found).
    pub nonce: Option<u32>,
    /// The resulting header hash (if found).
    pub hash: Option<Hash256>,
    /// Lowest hash seen in this batch.
    pub best_hash: Option<Hash256>,
    /// Number of hashes computed in this batch.
    pub hashes_computed: u64,
}

impl BatchResult {
    fn not_found(hashes: u64, best_hash: Option<Hash256>) -> Self {
        BatchResult {
            nonce: None,
            hash: None,
            best_hash,
            hashes_computed: hashes,
        }
    }

    fn found(nonce: u32, hash: Hash256, hashes: u64) -> Self {
        BatchResult {
            nonce: Some(nonce),
            hash: Some(hash),
            best_hash: Some(hash),
            hashes_computed: hashes,
        }
    }

    pub fn is_found(&self) -> bool {
        self.nonce.is_some()
    }
}

/// Hash `nonce_count` nonces starting at `nonce_start`, stopping at the first
/// hash below `target`.
///
/// The range never wraps: it ends at `u32::MAX` at the latest.
pub fn mine_range(
    header_without_nonce: &[u8; NONCE_OFFSET],
    target: &Hash256,
    nonce_start: u32,
    nonce_count: u32,
) -> BatchResult {
    if nonce_count == 0 {
        return BatchResult::not_found(0, None);
    }

    let mut header = [0u8; BLOCK_HEADER_SIZE];
    header[..NONCE_OFFSET].copy_from_slice(header_without_nonce);

    let nonce_end = nonce_start.saturating_add(nonce_count - 1);
    let mut best: Option<Hash256> = None;

    for nonce in nonce_start..=nonce_end {
        header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
        let hash = double_sha256(&header);

        if hash_meets_target(&hash, target) {
            return BatchResult::found(nonce, hash, (nonce - nonce_start) as u64 + 1);
        }

        if best.map_or(true, |b| hash < b) {
            best = Some(hash);
        }
    }

    BatchResult::not_found((nonce_end - nonce_start) as u64 + 1, best)
}

/// A header whose hash satisfies its own target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinedHeader {
    /// The header carrying the winning nonce.
    pub header: BlockHeader,
    pub hash: Hash256,
    /// Hashes computed during the run, including the winning one.
    pub attempts: u64,
}

/// Terminal state of a mining run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    Found(MinedHeader),
    TimedOut {
        attempts: u64,
        last_nonce: u32,
        elapsed: Duration,
    },
    NonceExhausted {
        attempts: u64,
        last_nonce: u32,
    },
}

impl MiningOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MiningOutcome::Found(_))
    }

    pub fn attempts(&self) -> u64 {
        match self {
            MiningOutcome::Found(mined) => mined.attempts,
            MiningOutcome::TimedOut { attempts, .. } | MiningOutcome::NonceExhausted { attempts, .. } => *attempts,
        }
    }

    pub fn mined(&self) -> Option<&MinedHeader> {
        match self {
            MiningOutcome::Found(mined) => Some(mined),
            _ => None,
        }
    }

    /// Short name of the terminal state.
    pub fn status(&self) -> &'static str {
        match self {
            MiningOutcome::Found(_) => "found",
            MiningOutcome::TimedOut { .. } => "timed_out",
            MiningOutcome::NonceExhausted { .. } => "nonce_exhausted",
        }
    }
}

/// Search nonces from `header.nonce` upwards until the header hash is below
/// `header.target`.
///
/// The header is consumed and only handed back inside
/// [`MiningOutcome::Found`]. The clock is read between batches of
/// `limits.batch_size` nonces, so a run may overshoot the time limit by one
/// batch. A start nonce above `limits.nonce_limit` exhausts immediately.
pub fn mine_header<C: Clock + ?Sized>(mut header: BlockHeader, limits: &MiningLimits, clock: &C) -> MiningOutcome {
    let started = clock.now();
    let time_limit = limits.time_limit();
    let prefix = header.serialize_without_nonce();
    let batch_size = limits.effective_batch_size();

    let mut nonce = header.nonce;
    let mut attempts = 0u64;

    if nonce > limits.nonce_limit {
        warn!(nonce, nonce_limit = limits.nonce_limit, "start nonce beyond limit");
        return MiningOutcome::NonceExhausted { attempts, last_nonce: nonce };
    }

    loop {
        let remaining = limits.nonce_limit - nonce;
        let count = if remaining < batch_size { remaining + 1 } else { batch_size };

        let batch = mine_range(&prefix, &header.target, nonce, count);
        attempts += batch.hashes_computed;
        trace!(start = nonce, count, attempts, "mined batch");

        if let (Some(winning), Some(hash)) = (batch.nonce, batch.hash) {
            header.nonce = winning;
            let elapsed = clock.now().saturating_sub(started);
            info!(
                nonce = winning,
                hash = %to_display_hex(&hash),
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "found a valid nonce"
            );
            return MiningOutcome::Found(MinedHeader { header, hash, attempts });
        }

        let last_nonce = nonce + (count - 1);

        if last_nonce == limits.nonce_limit {
            warn!(attempts, last_nonce, "nonce space exhausted");
            return MiningOutcome::NonceExhausted { attempts, last_nonce };
        }

        let elapsed = clock.now().saturating_sub(started);
        if elapsed >= time_limit {
            warn!(attempts, last_nonce, elapsed_ms = elapsed.as_millis() as u64, "mining time limit reached");
            return MiningOutcome::TimedOut { attempts, last_nonce, elapsed };
        }

        nonce = last_nonce + 1;
    }
}
