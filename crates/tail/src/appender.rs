use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only line writer, the producer side of a tailed file.
///
/// Every call flushes so a concurrent [`TailHandle`](crate::TailHandle)
/// sees the bytes immediately.
pub struct LineAppender {
    writer: BufWriter<File>,
}

impl LineAppender {
    /// Open (or create) a file for appending.
    pub fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append `line` followed by a newline.
    pub fn append_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Append raw bytes with no terminator added (for partial writes).
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    /// Fsync the underlying file.
    pub fn sync(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}
