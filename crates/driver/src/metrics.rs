use std::fmt;
use std::time::Instant;

/// Counters for one consumer run.
pub struct RunMetrics {
    lines_read: u64,
    accepted: u64,
    rejected: u64,
    blank: u64,
    empty_polls: u64,
    start_time: Instant,
}

/// Point-in-time copy of [`RunMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub lines_read: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub blank: u64,
    pub empty_polls: u64,
    pub uptime_secs: f64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            lines_read: 0,
            accepted: 0,
            rejected: 0,
            blank: 0,
            empty_polls: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&mut self) {
        self.lines_read += 1;
        self.accepted += 1;
    }

    pub fn record_rejected(&mut self) {
        self.lines_read += 1;
        self.rejected += 1;
    }

    pub fn record_blank(&mut self) {
        self.lines_read += 1;
        self.blank += 1;
    }

    pub fn record_empty_poll(&mut self) {
        self.empty_polls += 1;
    }

    /// Number of loop iterations that did any work or waited.
    pub fn iterations(&self) -> u64 {
        self.lines_read + self.empty_polls
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            lines_read: self.lines_read,
            accepted: self.accepted,
            rejected: self.rejected,
            blank: self.blank,
            empty_polls: self.empty_polls,
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accept_pct = if self.lines_read > 0 {
            (self.accepted as f64 / self.lines_read as f64 * 100.0) as u64
        } else {
            0
        };
        write!(
            f,
            "Lines: {} | Accepted: {} ({}%) | Rejected: {} | Blank: {} | Idle polls: {} | Uptime: {:.1}s",
            self.lines_read,
            self.accepted,
            accept_pct,
            self.rejected,
            self.blank,
            self.empty_polls,
            self.uptime_secs,
        )
    }
}
