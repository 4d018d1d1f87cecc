use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Group assigned to records with a missing or non-string `author`.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Sentiment assumed when a record carries no `sentiment` field.
pub const DEFAULT_SENTIMENT: f64 = 0.5;

/// Aggregation key (the record's author).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The reserved key for records without a usable author.
    pub fn unknown() -> Self {
        Self(UNKNOWN_GROUP.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One validated record: a value destined for a group.
///
/// `value` is nominally in [0, 1] but is never clamped here.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Update {
    pub group: GroupKey,
    pub value: f64,
}

impl Update {
    pub fn new(group: impl Into<GroupKey>, value: f64) -> Self {
        Self { group: group.into(), value }
    }
}

// ---------------------------------------------------------------------------
// Aggregate state
// ---------------------------------------------------------------------------

/// Running count and sum for one group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: u64,
    pub sum: f64,
}

impl GroupStats {
    /// Fold one value in.
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    /// Mean of all recorded values, `None` before the first one.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Per-group statistics in first-appearance order.
///
/// Lookup goes through a key → slot index so updates stay O(1) while
/// iteration keeps the order in which groups were first seen.
#[derive(Clone, Debug, Default)]
pub struct AggregateState {
    slots: Vec<(GroupKey, GroupStats)>,
    index: HashMap<GroupKey, usize>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable stats for `group`, inserting a zeroed entry at the end if new.
    pub fn entry(&mut self, group: &GroupKey) -> &mut GroupStats {
        let slot = match self.index.get(group) {
            Some(&slot) => slot,
            None => {
                let slot = self.slots.len();
                self.slots.push((group.clone(), GroupStats::default()));
                self.index.insert(group.clone(), slot);
                slot
            }
        };
        &mut self.slots[slot].1
    }

    pub fn get(&self, group: &str) -> Option<&GroupStats> {
        self.index
            .get(&GroupKey::new(group))
            .map(|&slot| &self.slots[slot].1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Groups in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &GroupStats)> {
        self.slots.iter().map(|(k, s)| (k, s))
    }

    /// Total number of accepted updates across all groups.
    pub fn total_count(&self) -> u64 {
        self.slots.iter().map(|(_, s)| s.count).sum()
    }
}

impl PartialEq for AggregateState {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl Serialize for AggregateState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        #[derive(Serialize)]
        struct Row<'a> {
            group: &'a GroupKey,
            count: u64,
            sum: f64,
            average: Option<f64>,
        }

        let mut seq = serializer.serialize_seq(Some(self.slots.len()))?;
        for (group, stats) in &self.slots {
            seq.serialize_element(&Row {
                group,
                count: stats.count,
                sum: stats.sum,
                average: stats.average(),
            })?;
        }
        seq.end()
    }
}

impl fmt::Display for AggregateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(k, s)| format!("{k}: n={} avg={:.3}", s.count, s.average().unwrap_or(0.0)))
            .collect();
        write!(f, "AggregateState({})", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Renderer trait — the aggregation ↔ visualization boundary
// ---------------------------------------------------------------------------

/// Anything that can draw a snapshot of the aggregate.
///
/// `render` is called after every accepted update and must tolerate being
/// called repeatedly with equal states. `finalize` is called once at shutdown.
pub trait Renderer {
    fn render(&mut self, state: &AggregateState);

    fn finalize(&mut self) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, state: &AggregateState) {
        (**self).render(state)
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, state: &AggregateState) {
        (**self).render(state)
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single line was not turned into an [`Update`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Whitespace-only line. Not malformed, just nothing there yet.
    #[error("blank line")]
    Blank,

    #[error("expected a JSON object, got {found}")]
    NotAnObject { found: String },

    #[error("sentiment is not a number: {raw}")]
    InvalidValue { raw: String },
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("data file {} does not exist", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unrecoverable failures while following an open file.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("{} was truncated (cursor {cursor}, length {len})", path.display())]
    Truncated { path: PathBuf, cursor: u64, len: u64 },

    #[error("{} was removed while tailing", path.display())]
    Removed { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
