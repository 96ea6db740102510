//! WebAssembly bindings for the proof-of-work block primitives.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Assembling a block from transactions
//! - Mining in batches or until a limit is reached
//! - Producing and checking Merkle inclusion proofs
//! - Reporting mining progress on the browser console

use wasm_bindgen::prelude::*;

pub mod logging;
pub mod miner;
pub mod session;
pub mod state;

// Re-export main types for JS access
pub use miner::Miner;
pub use session::MiningSession;
pub use state::{BlockSummary, MiningResultInfo, MiningStats, SessionState};

/// Initialize the WASM module with better panic messages and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    logging::init_logging();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
