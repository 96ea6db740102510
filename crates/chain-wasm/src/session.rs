//! Incremental mining over one block.
//!
//! The browser cannot block its event loop for a whole search, so a session
//! mines in caller-sized batches and keeps its position between calls. Time
//! is passed in as milliseconds so the session itself never touches a JS API.

use chain_core::{
    difficulty::leading_zero_bits,
    hash::to_display_hex,
    mine_range, Block, Clock, Hash256, MinedHeader, MiningLimits, MiningOutcome, Transaction, Txid,
};
use tracing::{info, warn};

use crate::state::{MiningResultInfo, MiningStats, SessionState};

#[derive(Debug, Clone)]
pub struct MiningSession {
    block: Block,
    limits: MiningLimits,
    next_nonce: u32,
    state: SessionState,
    started_ms: f64,
    /// Time spent in earlier runs that ended in a time-out.
    previous_runs_ms: f64,
    stats: MiningStats,
    best_hash: Option<Hash256>,
}

impl MiningSession {
    /// Start a session over `block`, searching from nonce zero.
    ///
    /// The header's Merkle root is brought in line with the transactions first.
    pub fn new(mut block: Block, limits: MiningLimits) -> Self {
        block.update_merkle_root();
        MiningSession {
            block,
            limits,
            next_nonce: 0,
            state: SessionState::Idle,
            started_ms: 0.0,
            previous_runs_ms: 0.0,
            stats: MiningStats::new(),
            best_hash: None,
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn limits(&self) -> &MiningLimits {
        &self.limits
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn next_nonce(&self) -> u32 {
        self.next_nonce
    }

    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    /// Begin or resume the search at `now_ms`.
    ///
    /// A session that timed out picks up where it stopped with a fresh time
    /// budget. Found and exhausted sessions stay as they are.
    pub fn start(&mut self, now_ms: f64) {
        if self.state.is_final() || self.state == SessionState::Searching {
            return;
        }
        if self.state == SessionState::TimedOut {
            self.previous_runs_ms = self.stats.elapsed_ms;
        }
        self.started_ms = now_ms;
        self.set_state(SessionState::Searching);
    }

    /// Hash up to `batch_size` nonces, then check the nonce and time limits.
    ///
    /// An idle session is started at `now_ms`. Once the session is in a
    /// terminal state the call hashes nothing and reports that state.
    pub fn step(&mut self, batch_size: u32, now_ms: f64) -> MiningResultInfo {
        if self.state == SessionState::Idle {
            self.start(now_ms);
        }
        if self.state != SessionState::Searching {
            return self.result(None, 0);
        }

        let start = self.next_nonce;
        if start > self.limits.nonce_limit {
            self.set_state(SessionState::NonceExhausted);
            return self.result(None, 0);
        }

        let remaining = self.limits.nonce_limit - start;
        let batch_size = batch_size.max(1);
        let count = if remaining < batch_size { remaining + 1 } else { batch_size };

        let prefix = self.block.header.serialize_without_nonce();
        let batch = mine_range(&prefix, &self.block.header.target, start, count);

        self.stats.total_hashes += batch.hashes_computed;
        if let Some(best) = batch.best_hash {
            self.offer_best(best);
        }
        self.update_elapsed(now_ms);

        if let (Some(nonce), Some(hash)) = (batch.nonce, batch.hash) {
            self.block.header.nonce = nonce;
            self.next_nonce = nonce;
            self.stats.current_nonce = nonce;
            self.set_state(SessionState::Found);
            info!(nonce, hash = %to_display_hex(&hash), total_hashes = self.stats.total_hashes, "block found");
            return self.result(Some((nonce, hash)), batch.hashes_computed);
        }

        let last_nonce = start + (count - 1);
        if last_nonce == self.limits.nonce_limit {
            self.next_nonce = last_nonce;
            self.set_state(SessionState::NonceExhausted);
            warn!(last_nonce, "nonce space exhausted");
        } else {
            self.next_nonce = last_nonce + 1;
            if now_ms - self.started_ms >= self.limits.time_limit_ms as f64 {
                self.set_state(SessionState::TimedOut);
                warn!(last_nonce, elapsed_ms = self.stats.elapsed_ms, "mining time limit reached");
            }
        }

        self.stats.current_nonce = self.next_nonce;
        self.result(None, batch.hashes_computed)
    }

    /// Search until a terminal state, reading time from `clock`.
    ///
    /// Resumes from the session's current nonce. This blocks the caller for up
    /// to the configured time limit. A found or exhausted session hashes
    /// nothing and reports its stored result with zero attempts.
    pub fn run_to_completion<C: Clock + ?Sized>(&mut self, clock: &C) -> MiningOutcome {
        if let Some(outcome) = self.final_outcome() {
            return outcome;
        }

        let started = clock.now();
        if self.state == SessionState::Idle || self.state == SessionState::TimedOut {
            self.start(started.as_secs_f64() * 1000.0);
        }

        self.block.header.nonce = self.next_nonce;
        let outcome = self.block.mine(&self.limits, clock);

        self.stats.total_hashes += outcome.attempts();
        match &outcome {
            MiningOutcome::Found(mined) => {
                self.next_nonce = mined.header.nonce;
                self.offer_best(mined.hash);
                self.set_state(SessionState::Found);
            }
            MiningOutcome::TimedOut { last_nonce, .. } => {
                self.next_nonce = last_nonce.saturating_add(1);
                self.set_state(SessionState::TimedOut);
            }
            MiningOutcome::NonceExhausted { last_nonce, .. } => {
                self.next_nonce = *last_nonce;
                self.set_state(SessionState::NonceExhausted);
            }
        }
        self.stats.current_nonce = self.next_nonce;
        self.update_elapsed(clock.now().as_secs_f64() * 1000.0);

        outcome
    }

    /// Append a transaction and restart the search.
    ///
    /// The segwit marker and flag are derived from the witness data, the Merkle
    /// root is recomputed and all progress is discarded.
    pub fn add_transaction(&mut self, mut tx: Transaction) -> Txid {
        tx.sync_segwit_flags();
        let txid = tx.txid();

        self.block.push_transaction(tx);
        self.block.update_merkle_root();
        self.reset_search();

        info!(txid = %to_display_hex(&txid), count = self.block.transactions.len(), "transaction added");
        txid
    }

    /// Discard progress and search the current block again from nonce zero.
    pub fn reset_search(&mut self) {
        self.block.header.nonce = 0;
        self.next_nonce = 0;
        self.started_ms = 0.0;
        self.previous_runs_ms = 0.0;
        self.best_hash = None;
        self.stats = MiningStats::new();
        self.state = SessionState::Idle;
    }

    fn final_outcome(&self) -> Option<MiningOutcome> {
        match self.state {
            SessionState::Found => {
                let header = self.block.header;
                Some(MiningOutcome::Found(MinedHeader { header, hash: header.hash(), attempts: 0 }))
            }
            SessionState::NonceExhausted => {
                Some(MiningOutcome::NonceExhausted { attempts: 0, last_nonce: self.next_nonce })
            }
            _ => None,
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.stats.state = state;
    }

    fn offer_best(&mut self, hash: Hash256) {
        if self.best_hash.map_or(true, |best| hash < best) {
            self.best_hash = Some(hash);
            self.stats.record_best(&hash);
        }
    }

    fn update_elapsed(&mut self, now_ms: f64) {
        self.stats.elapsed_ms = self.previous_runs_ms + (now_ms - self.started_ms).max(0.0);
        self.stats.update_hash_rate();
    }

    fn result(&self, found: Option<(u32, Hash256)>, hashes_computed: u64) -> MiningResultInfo {
        MiningResultInfo {
            status: self.state,
            nonce: found.map(|(nonce, _)| nonce),
            hash: found.map(|(_, hash)| hex::encode(hash)),
            leading_zero_bits: found.map_or(0, |(_, hash)| leading_zero_bits(&hash)),
            hashes_computed,
            next_nonce: self.next_nonce,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;
    use chain_core::{
        difficulty::MAX_TARGET, target_with_leading_zero_bits, OutPoint, TxIn, TxOut,
    };

    struct StepClock {
        now: Cell<Duration>,
        step: Duration,
    }

    impl Clock for StepClock {
        fn now(&self) -> Duration {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    fn transfer(seed: u8) -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(OutPoint::new([seed; 32], 0), vec![seed], 0xffff_ffff)],
            vec![TxOut::new(1_000, vec![0x51])],
            0,
        )
    }

    fn session(target: Hash256, limits: MiningLimits) -> MiningSession {
        let block = Block::assemble([0x11; 32], 1_700_000_000, target, vec![transfer(1), transfer(2)]);
        MiningSession::new(block, limits)
    }

    #[test]
    fn test_step_finds_easy_target() {
        let mut session = session(target_with_leading_zero_bits(8), MiningLimits::default());
        assert_eq!(session.state(), SessionState::Idle);

        let mut steps = 0;
        let result = loop {
            let result = session.step(64, 0.0);
            steps += 1;
            if result.status != SessionState::Searching || steps > 1_000 {
                break result;
            }
        };

        assert_eq!(result.status, SessionState::Found);
        let nonce = result.nonce.unwrap();
        assert_eq!(session.block().header.nonce, nonce);
        assert!(session.block().check_proof_of_work());
        assert_eq!(result.hash, Some(hex::encode(session.block().header.hash())));
        assert!(result.leading_zero_bits >= 8);
        assert_eq!(session.stats().total_hashes, nonce as u64 + 1);

        // a found session stays found
        let again = session.step(64, 10.0);
        assert_eq!(again.status, SessionState::Found);
        assert_eq!(again.hashes_computed, 0);
    }

    #[test]
    fn test_step_exhausts_nonce_limit() {
        let limits = MiningLimits::default().with_nonce_limit(99);
        let mut session = session([0u8; 32], limits);

        let first = session.step(60, 0.0);
        assert_eq!(first.status, SessionState::Searching);
        assert_eq!(first.hashes_computed, 60);
        assert_eq!(first.next_nonce, 60);

        let second = session.step(60, 1.0);
        assert_eq!(second.status, SessionState::NonceExhausted);
        assert_eq!(second.hashes_computed, 40);
        assert_eq!(session.stats().total_hashes, 100);
        assert!(session.stats().best_hash.is_some());
    }

    #[test]
    fn test_step_times_out_and_resumes() {
        let limits = MiningLimits::default().with_time_limit(Duration::from_millis(50));
        let mut session = session([0u8; 32], limits);

        session.start(1_000.0);
        assert_eq!(session.step(10, 1_020.0).status, SessionState::Searching);
        let timed_out = session.step(10, 1_050.0);
        assert_eq!(timed_out.status, SessionState::TimedOut);
        assert_eq!(timed_out.next_nonce, 20);

        // no hashing while timed out
        assert_eq!(session.step(10, 1_060.0).hashes_computed, 0);

        session.start(2_000.0);
        let resumed = session.step(10, 2_010.0);
        assert_eq!(resumed.status, SessionState::Searching);
        assert_eq!(resumed.next_nonce, 30);
        assert_eq!(session.stats().elapsed_ms, 60.0);
    }

    #[test]
    fn test_add_transaction_restarts_search() {
        let limits = MiningLimits::default().with_nonce_limit(9);
        let mut session = session([0u8; 32], limits);
        session.step(100, 0.0);
        assert_eq!(session.state(), SessionState::NonceExhausted);

        let root_before = session.block().header.merkle_root;
        let txid = session.add_transaction(transfer(3));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.next_nonce(), 0);
        assert_eq!(session.stats().total_hashes, 0);
        assert_ne!(session.block().header.merkle_root, root_before);
        assert!(session.block().has_valid_merkle_root());
        assert_eq!(session.block().verify_transaction(&txid), Ok(true));
    }

    #[test]
    fn test_add_segwit_transaction_sets_flags() {
        let mut session = session(MAX_TARGET, MiningLimits::default());
        let mut tx = transfer(4);
        tx.inputs[0].witness = vec![vec![0x30; 8]];

        let txid = session.add_transaction(tx);
        let added = session.block().transactions.last().unwrap();
        assert_eq!((added.marker, added.flag), (0, 1));
        assert_eq!(added.txid(), txid);
    }

    #[test]
    fn test_run_to_completion() {
        let mut session = session(target_with_leading_zero_bits(8), MiningLimits::default());
        let clock = StepClock { now: Cell::new(Duration::ZERO), step: Duration::from_millis(1) };

        let outcome = session.run_to_completion(&clock);
        assert!(outcome.is_found());
        assert_eq!(session.state(), SessionState::Found);
        assert!(session.block().check_proof_of_work());
        assert_eq!(session.stats().total_hashes, outcome.attempts());
    }

    #[test]
    fn test_finished_session_is_not_mined_again() {
        let limits = MiningLimits::default().with_nonce_limit(9);
        let mut exhausted = session([0u8; 32], limits);
        exhausted.step(100, 0.0);
        assert_eq!(exhausted.stats().total_hashes, 10);

        let clock = StepClock { now: Cell::new(Duration::ZERO), step: Duration::from_millis(1) };
        let outcome = exhausted.run_to_completion(&clock);
        assert_eq!(outcome, MiningOutcome::NonceExhausted { attempts: 0, last_nonce: 9 });
        assert_eq!(exhausted.stats().total_hashes, 10);

        let mut found = session(target_with_leading_zero_bits(8), MiningLimits::default());
        let first = found.run_to_completion(&clock);
        let header = found.block().header;

        let again = found.run_to_completion(&clock);
        assert_eq!(again.attempts(), 0);
        assert_eq!(again.mined().map(|m| m.header), Some(header));
        assert_eq!(found.block().header, header);
        assert_eq!(found.stats().total_hashes, first.attempts());
    }

    #[test]
    fn test_found_step_updates_current_nonce() {
        let mut session = session(target_with_leading_zero_bits(8), MiningLimits::default());

        let mut result = session.step(64, 0.0);
        while result.status == SessionState::Searching {
            result = session.step(64, 0.0);
        }

        assert_eq!(result.status, SessionState::Found);
        assert_eq!(session.stats().current_nonce, result.nonce.unwrap());
        assert_eq!(session.stats().state, SessionState::Found);
    }

    #[test]
    fn test_run_to_completion_resumes_after_time_out() {
        let limits = MiningLimits::default()
            .with_time_limit(Duration::from_millis(10))
            .with_batch_size(25);
        let mut session = session([0u8; 32], limits);
        let clock = StepClock { now: Cell::new(Duration::ZERO), step: Duration::from_millis(10) };

        let outcome = session.run_to_completion(&clock);
        assert!(matches!(outcome, MiningOutcome::TimedOut { last_nonce: 24, .. }));
        assert_eq!(session.next_nonce(), 25);

        session.run_to_completion(&clock);
        assert_eq!(session.next_nonce(), 50);
        assert_eq!(session.stats().total_hashes, 50);
    }
}
