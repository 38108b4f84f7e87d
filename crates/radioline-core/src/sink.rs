//! Single-writer JSON Lines output sink shared across worker threads.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

/// Append-only JSON Lines file with one exclusive lock per write.
///
/// Each successful [`append`](JsonLinesSink::append) writes exactly one
/// serialized record plus a newline and flushes before releasing the lock,
/// so concurrent writers can never interleave bytes. Flushed, not fsynced.
pub struct JsonLinesSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Serialize one record as a single line. Whole-line-or-nothing under
    /// concurrency; returns an error after [`close`](JsonLinesSink::close).
    pub fn append<R: Serialize>(&self, record: &R) -> io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let writer = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Flush and close the file exactly once. Best-effort: errors are
    /// logged, not propagated, and repeated calls are no-ops.
    pub fn close(&self) {
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.flush() {
                log::warn!("failed to flush output sink: {e}");
            }
        }
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        self.close();
    }
}
