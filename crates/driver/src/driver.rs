use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sentiment_tail_aggregate::{parse, GroupAggregator};
use sentiment_tail_common::{AggregateState, OpenError, ParseError, Renderer, TailError};
use sentiment_tail_tail::{TailEvent, TailHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::metrics::{MetricsSummary, RunMetrics};

/// Lifecycle of a [`Driver`].
///
/// `Idle → Validating → Tailing → Stopped | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Validating,
    Tailing,
    Stopped,
    Failed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Idle => write!(f, "idle"),
            DriverState::Validating => write!(f, "validating"),
            DriverState::Tailing => write!(f, "tailing"),
            DriverState::Stopped => write!(f, "stopped"),
            DriverState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Tail(#[from] TailError),

    #[error("driver already ran (state: {0})")]
    AlreadyRan(DriverState),
}

/// What a cleanly cancelled run leaves behind.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: AggregateState,
    pub metrics: MetricsSummary,
}

/// Wires tail → parse → aggregate → render.
///
/// Single-threaded and cooperative: the only suspension point is the sleep
/// after a poll that found nothing. Rendering happens inline, so a slow
/// renderer slows the loop down rather than queueing snapshots.
pub struct Driver<R: Renderer> {
    path: PathBuf,
    poll_interval: Duration,
    renderer: R,
    aggregator: GroupAggregator,
    state: DriverState,
    metrics: RunMetrics,
}

impl<R: Renderer> Driver<R> {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, renderer: R) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            renderer,
            aggregator: GroupAggregator::new(),
            state: DriverState::Idle,
            metrics: RunMetrics::new(),
        }
    }

    pub fn from_config(config: &ConsumerConfig, renderer: R) -> Self {
        Self::new(config.path.clone(), config.poll_interval(), renderer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn aggregator(&self) -> &GroupAggregator {
        &self.aggregator
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Validate the input file, then tail it until `cancel` fires.
    ///
    /// A missing file fails immediately without entering the loop. Bad
    /// records are logged and skipped. The renderer is finalized once the
    /// loop ends, whether by cancellation or by a fatal read error.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary, DriverError> {
        if self.state != DriverState::Idle {
            return Err(DriverError::AlreadyRan(self.state));
        }

        self.state = DriverState::Validating;
        let mut tail = match TailHandle::open(&self.path) {
            Ok(tail) => tail,
            Err(e) => {
                self.state = DriverState::Failed;
                error!(error = %e, "startup validation failed");
                return Err(e.into());
            }
        };

        self.state = DriverState::Tailing;
        info!(
            path = %self.path.display(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "consumer ready, waiting for new messages"
        );

        let result = self.tail_loop(&mut tail, &cancel).await;
        drop(tail);
        self.renderer.finalize();

        let summary = self.metrics.summary();
        match result {
            Ok(()) => {
                self.state = DriverState::Stopped;
                info!(%summary, "consumer stopped");
                Ok(RunSummary {
                    state: self.aggregator.snapshot(),
                    metrics: summary,
                })
            }
            Err(e) => {
                self.state = DriverState::Failed;
                error!(error = %e, %summary, "tailing failed");
                Err(e.into())
            }
        }
    }

    async fn tail_loop(
        &mut self,
        tail: &mut TailHandle,
        cancel: &CancellationToken,
    ) -> Result<(), TailError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match tail.next_line()? {
                TailEvent::Line(line) => {
                    self.ingest_line(&line);
                    // Let the cancellation source run even while lines keep coming.
                    tokio::task::yield_now().await;
                }
                TailEvent::Blank => self.skip_blank(),
                TailEvent::NoDataYet => {
                    self.metrics.record_empty_poll();
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }

    fn skip_blank(&mut self) {
        self.metrics.record_blank();
        debug!("blank line skipped");
    }

    /// Parse one line and, if it is a valid record, fold it in and render.
    pub fn ingest_line(&mut self, line: &str) {
        match parse(line) {
            Ok(update) => {
                info!(group = %update.group, value = update.value, "processed message");
                self.aggregator.apply(update);
                self.metrics.record_accepted();
                self.renderer.render(self.aggregator.view());
            }
            Err(ParseError::Blank) => self.skip_blank(),
            Err(e) => {
                self.metrics.record_rejected();
                warn!(reason = %e, "rejected line");
            }
        }
    }
}
