use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use sentiment_tail_common::AggregateState;
use serde::Serialize;

#[derive(Serialize)]
struct TraceLine<'a> {
    seq: u64,
    timestamp_us: u64,
    groups: &'a AggregateState,
}

/// Writes one line-delimited JSON entry per rendered snapshot to a file.
pub struct JsonTracer {
    writer: BufWriter<File>,
    seq: u64,
    start: Instant,
}

impl JsonTracer {
    /// Open a new trace file (creates or truncates).
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            seq: 0,
            start: Instant::now(),
        })
    }

    /// Write one snapshot as a JSON line.
    pub fn trace(&mut self, state: &AggregateState) {
        self.seq += 1;
        let line = TraceLine {
            seq: self.seq,
            timestamp_us: self.start.elapsed().as_micros() as u64,
            groups: state,
        };

        let json = match serde_json::to_string(&line) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode trace line");
                return;
            }
        };
        if let Err(e) = writeln!(self.writer, "{json}").and_then(|_| self.writer.flush()) {
            tracing::warn!(error = %e, "failed to write trace line");
        }
    }
}
