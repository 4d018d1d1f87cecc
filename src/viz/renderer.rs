use std::io::{self, Write};

use sentiment_tail_common::{AggregateState, GroupStats, Renderer};

use super::tracer::JsonTracer;

const LABEL_WIDTH: usize = 14;
const TITLE: &str = "Average Sentiment by Author";

/// Configuration for the terminal chart.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Whether to use ANSI color codes.
    pub color: bool,
    /// Columns for a full-scale (1.0) bar.
    pub width: usize,
    /// Redraw in place on every update. Off means headless: only the final
    /// chart is printed.
    pub live: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            color: true,
            width: 40,
            live: true,
        }
    }
}

// ANSI escape helpers
struct Ansi {
    color: bool,
}

impl Ansi {
    fn new(color: bool) -> Self {
        Self { color }
    }
    fn green(&self, s: &str) -> String {
        if self.color { format!("\x1b[32m{s}\x1b[0m") } else { s.to_string() }
    }
    fn yellow(&self, s: &str) -> String {
        if self.color { format!("\x1b[33m{s}\x1b[0m") } else { s.to_string() }
    }
    fn red(&self, s: &str) -> String {
        if self.color { format!("\x1b[31m{s}\x1b[0m") } else { s.to_string() }
    }
    fn cyan(&self, s: &str) -> String {
        if self.color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }
    fn bold(&self, s: &str) -> String {
        if self.color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }
    fn dim(&self, s: &str) -> String {
        if self.color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }
}

/// Horizontal bar chart of average sentiment per author.
///
/// Bars keep first-appearance order so existing rows never jump around as
/// new authors show up. The axis is fixed to 0..1; averages outside it are
/// clamped for drawing only.
pub struct ChartRenderer {
    config: ChartConfig,
    frames: u64,
    /// Copy of the most recent frame's state, drawn again by `finalize`.
    last: Option<AggregateState>,
    /// Set once the screen has been wiped ahead of the first live frame.
    screen_cleared: bool,
    tracer: Option<JsonTracer>,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            frames: 0,
            last: None,
            screen_cleared: false,
            tracer: None,
        }
    }

    /// Attach a JSON tracer that records every rendered snapshot.
    pub fn set_tracer(&mut self, tracer: JsonTracer) {
        self.tracer = Some(tracer);
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Build the chart rows for `state` (no cursor control sequences).
    fn frame_lines(&self, state: &AggregateState, final_frame: bool) -> Vec<String> {
        let a = Ansi::new(self.config.color);
        let width = self.config.width;
        let mut lines = Vec::with_capacity(state.len() + 4);

        let suffix = if final_frame { "(final)" } else { "(live)" };
        let header = format!("\u{2550}\u{2550}\u{2550} {} {} ", TITLE, suffix);
        let rule_len = (LABEL_WIDTH + width + 16).saturating_sub(header.chars().count());
        lines.push(a.bold(&a.cyan(&format!("{header}{}", "\u{2550}".repeat(rule_len)))));

        if state.is_empty() {
            lines.push(a.dim("  (waiting for messages)"));
        }

        for (group, stats) in state.iter() {
            lines.push(self.bar_line(&a, group.as_str(), stats));
        }

        // Axis: 0 at the left edge, 0.5 in the middle, 1 at the right edge.
        let mid = width / 2;
        let axis = format!(
            "{} 0{}0.5{}1",
            " ".repeat(LABEL_WIDTH),
            " ".repeat(mid.saturating_sub(1)),
            " ".repeat(width.saturating_sub(mid + 3)),
        );
        lines.push(a.dim(&axis));
        lines.push(a.dim(&format!(
            "  {} author(s), {} message(s)",
            state.len(),
            state.total_count()
        )));
        lines
    }

    fn bar_line(&self, a: &Ansi, group: &str, stats: &GroupStats) -> String {
        let width = self.config.width;
        let avg = stats.average().unwrap_or(0.0);
        let filled = (avg.clamp(0.0, 1.0) * width as f64).round() as usize;

        let label = fit_label(group, LABEL_WIDTH);
        let bar = "\u{2588}".repeat(filled);
        let bar = if avg >= 0.6 {
            a.green(&bar)
        } else if avg >= 0.4 {
            a.yellow(&bar)
        } else {
            a.red(&bar)
        };
        format!(
            "{label} {bar}{} {avg:>5.2}  n={}",
            " ".repeat(width - filled),
            stats.count
        )
    }

    /// Full terminal payload for one frame. Live frames are drawn from the
    /// cursor-home position; the very first one also wipes the screen.
    fn frame_buffer(&mut self, state: &AggregateState, final_frame: bool) -> String {
        let mut buf = String::with_capacity(1024);
        if !final_frame {
            if !self.screen_cleared {
                buf.push_str("\x1b[2J");
                self.screen_cleared = true;
            }
            // Cursor home; rows are overwritten in place.
            buf.push_str("\x1b[H");
        }
        for line in self.frame_lines(state, final_frame) {
            buf.push_str(&line);
            if !final_frame {
                buf.push_str("\x1b[K");
            }
            buf.push('\n');
        }
        if !final_frame {
            // Clear leftovers from a previous, taller frame.
            buf.push_str("\x1b[J");
        }
        buf
    }

    fn write_frame(&mut self, state: &AggregateState, final_frame: bool) {
        let buf = self.frame_buffer(state, final_frame);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(buf.as_bytes());
        let _ = handle.flush();
    }
}

impl Renderer for ChartRenderer {
    fn render(&mut self, state: &AggregateState) {
        self.frames += 1;
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.trace(state);
        }
        if self.config.live {
            self.write_frame(state, false);
        }
        self.last = Some(state.clone());
    }

    fn finalize(&mut self) {
        let state = self.last.take().unwrap_or_default();
        if self.config.live {
            // Leave the live frame on screen and print the static one below it.
            println!();
        }
        self.write_frame(&state, true);
    }
}

/// Pad or truncate `label` to exactly `width` characters.
fn fit_label(label: &str, width: usize) -> String {
    let count = label.chars().count();
    if count > width {
        let head: String = label.chars().take(width - 1).collect();
        format!("{head}\u{2026}")
    } else {
        format!("{label}{}", " ".repeat(width - count))
    }
}
