//! Forwards `tracing` events to the browser console.

use std::io;

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

use crate::miner::console_log;

/// Hands the formatter one [`ConsoleWriter`] per event.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleMakeWriter {
    emit: fn(&str),
}

impl ConsoleMakeWriter {
    /// Send each formatted event to `emit` as a single line.
    pub fn new(emit: fn(&str)) -> Self {
        ConsoleMakeWriter { emit }
    }
}

impl Default for ConsoleMakeWriter {
    fn default() -> Self {
        Self::new(console_log)
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            buf: Vec::new(),
            emit: self.emit,
        }
    }
}

/// Buffers one formatted event and emits it when dropped.
pub struct ConsoleWriter {
    buf: Vec<u8>,
    emit: fn(&str),
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let line = text.trim_end();
        if !line.is_empty() {
            (self.emit)(line);
        }
    }
}

/// Plain-text subscriber writing `INFO` and above through `writer`.
///
/// No timestamps: `SystemTime` is unavailable on `wasm32-unknown-unknown`.
pub fn console_subscriber(writer: ConsoleMakeWriter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_writer(writer)
        .without_time()
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .finish()
}

/// Install the console subscriber as the global default. Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing::subscriber::set_global_default(console_subscriber(ConsoleMakeWriter::default()));
}
