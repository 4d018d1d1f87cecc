use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sentiment_tail_common::{OpenError, TailError};
use tracing::{debug, trace};

/// Outcome of one pull from a [`TailHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// A complete, non-blank line with its terminator stripped.
    Line(String),
    /// A complete line holding nothing but whitespace.
    Blank,
    /// Nothing complete past the cursor yet. Poll again later.
    NoDataYet,
}

/// Follows a growing file from the point it was opened.
///
/// Bytes of an unterminated trailing line are held back until the producer
/// finishes the line, so a record split across two writes comes out whole.
pub struct TailHandle {
    path: PathBuf,
    reader: BufReader<File>,
    /// Byte offset just past everything read so far (including `pending`).
    cursor: u64,
    pending: Vec<u8>,
}

impl TailHandle {
    /// Open `path` and position the cursor at its current end.
    ///
    /// Fails fast with [`OpenError::FileNotFound`] if the file is missing;
    /// there is no waiting for it to appear.
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OpenError::FileNotFound { path: path.to_path_buf() });
            }
            Err(e) => return Err(e.into()),
        };
        let cursor = file.seek(SeekFrom::End(0))?;
        debug!(path = %path.display(), cursor, "tail opened at end of file");

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            cursor,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the read cursor.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Bytes of a partially written line waiting for its newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pull the next complete line, or report that none is available.
    ///
    /// Never blocks waiting for data. Whitespace-only lines come back as
    /// [`TailEvent::Blank`] so the caller can count them.
    pub fn next_line(&mut self) -> Result<TailEvent, TailError> {
        let before = self.pending.len();
        let result = self.reader.read_until(b'\n', &mut self.pending);
        self.cursor += (self.pending.len() - before) as u64;

        match result {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                trace!(error = %e, "transient read error");
                return Ok(TailEvent::NoDataYet);
            }
            Err(e) => return Err(e.into()),
        }

        if self.pending.last() != Some(&b'\n') {
            self.check_file()?;
            return Ok(TailEvent::NoDataYet);
        }

        let raw = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches(&['\n', '\r'][..]);
        if line.trim().is_empty() {
            trace!(cursor = self.cursor, "blank line");
            return Ok(TailEvent::Blank);
        }
        Ok(TailEvent::Line(line.to_string()))
    }

    /// Detect the file disappearing or shrinking underneath the cursor.
    fn check_file(&self) -> Result<(), TailError> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TailError::Removed { path: self.path.clone() });
            }
            Err(e) => return Err(e.into()),
        };
        if len < self.cursor {
            return Err(TailError::Truncated {
                path: self.path.clone(),
                cursor: self.cursor,
                len,
            });
        }
        Ok(())
    }
}
