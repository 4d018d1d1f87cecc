use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentiment_tail_common::{AggregateState, OpenError, Renderer};
use sentiment_tail_driver::{ConsumerConfig, Driver, DriverError, DriverState};
use sentiment_tail_tail::LineAppender;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Renderer that keeps every frame it is handed.
#[derive(Default, Clone)]
struct FrameLog {
    frames: Arc<Mutex<Vec<AggregateState>>>,
    finalized: Arc<Mutex<bool>>,
}

impl FrameLog {
    fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl Renderer for FrameLog {
    fn render(&mut self, state: &AggregateState) {
        self.frames.lock().unwrap().push(state.clone());
    }

    fn finalize(&mut self) {
        *self.finalized.lock().unwrap() = true;
    }
}

fn config_for(dir: &TempDir) -> ConsumerConfig {
    ConsumerConfig {
        path: dir.path().join("project_live.json"),
        poll_interval_ms: 5,
        ..ConsumerConfig::default()
    }
}

async fn wait_for_frames(log: &FrameLog, n: usize) {
    while log.len() < n {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =========================================================================
// alice 0.8, bob 0.2, alice 0.6 → alice n=2 avg 0.7, bob n=1 avg 0.2
// =========================================================================
#[tokio::test]
async fn test_end_to_end_scenario() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    std::fs::write(&config.path, "{\"author\":\"ghost\",\"sentiment\":1.0}\n").unwrap();

    let log = FrameLog::default();
    let cancel = CancellationToken::new();
    let mut driver = Driver::from_config(&config, log.clone());

    let producer_log = log.clone();
    let producer_cancel = cancel.clone();
    let path = config.path.clone();
    let producer = tokio::spawn(async move {
        let mut out = LineAppender::open(&path).unwrap();
        out.append_line(r#"{"author":"alice","sentiment":0.8}"#).unwrap();
        out.append_line(r#"{"author":"bob","sentiment":0.2}"#).unwrap();
        out.append_line(r#"{"author":"alice","sentiment":0.6}"#).unwrap();
        wait_for_frames(&producer_log, 3).await;
        producer_cancel.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), driver.run(cancel))
        .await
        .expect("driver did not stop")
        .unwrap();
    producer.await.unwrap();

    let state = summary.state;
    let order: Vec<&str> = state.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(order, vec!["alice", "bob"]);

    let alice = state.get("alice").unwrap();
    assert_eq!(alice.count, 2);
    assert!((alice.average().unwrap() - 0.7).abs() < 1e-9);
    let bob = state.get("bob").unwrap();
    assert_eq!(bob.count, 1);
    assert!((bob.average().unwrap() - 0.2).abs() < 1e-9);

    // One render per accepted update, each frame a consistent prefix.
    let frames = log.frames.lock().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].total_count(), 1);
    assert_eq!(frames[1].total_count(), 2);
    assert_eq!(frames[2], state);
    assert!(*log.finalized.lock().unwrap());
}

// =========================================================================
// Bad records are skipped without stopping aggregation
// =========================================================================
#[tokio::test]
async fn test_rejected_lines_do_not_stop_loop() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    std::fs::write(&config.path, "").unwrap();

    let log = FrameLog::default();
    let cancel = CancellationToken::new();
    let mut driver = Driver::from_config(&config, log.clone());

    let producer_log = log.clone();
    let producer_cancel = cancel.clone();
    let path = config.path.clone();
    let producer = tokio::spawn(async move {
        let mut out = LineAppender::open(&path).unwrap();
        out.append_line("not json").unwrap();
        out.append_line("[1,2,3]").unwrap();
        out.append_line(r#"{"sentiment":"bad"}"#).unwrap();
        out.append_line("{}").unwrap();
        out.append_line(r#"{"author":"carol","sentiment":0.4,"extra":true}"#).unwrap();
        wait_for_frames(&producer_log, 2).await;
        producer_cancel.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), driver.run(cancel))
        .await
        .expect("driver did not stop")
        .unwrap();
    producer.await.unwrap();

    assert_eq!(summary.metrics.rejected, 3);
    assert_eq!(summary.metrics.accepted, 2);
    let unknown = summary.state.get("unknown").unwrap();
    assert_eq!(unknown.count, 1);
    assert_eq!(unknown.sum, 0.5);
    assert_eq!(summary.state.get("carol").unwrap().sum, 0.4);
}

// =========================================================================
// Missing file: immediate FileNotFound, no loop iterations, no rendering
// =========================================================================
#[tokio::test]
async fn test_startup_failure() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);

    let log = FrameLog::default();
    let mut driver = Driver::from_config(&config, log.clone());
    let err = driver.run(CancellationToken::new()).await.unwrap_err();

    match err {
        DriverError::Open(OpenError::FileNotFound { path }) => assert_eq!(path, config.path),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(driver.state(), DriverState::Failed);
    assert_eq!(driver.metrics().iterations(), 0);
    assert_eq!(log.len(), 0);
    assert!(!*log.finalized.lock().unwrap());
}

// =========================================================================
// Cancellation while idle exits on the next boundary and finalizes once
// =========================================================================
#[tokio::test]
async fn test_cancel_while_idle() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.poll_interval_ms = 60_000;
    std::fs::write(&config.path, "").unwrap();

    let log = FrameLog::default();
    let cancel = CancellationToken::new();
    let mut driver = Driver::from_config(&config, log.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    // Well under the poll interval: the sleep must be interrupted.
    let summary = tokio::time::timeout(Duration::from_secs(5), driver.run(cancel))
        .await
        .expect("cancellation did not interrupt the poll sleep")
        .unwrap();

    assert!(summary.state.is_empty());
    assert_eq!(driver.state(), DriverState::Stopped);
    assert!(*log.finalized.lock().unwrap());
}

// =========================================================================
// Cancellation while a backlog is still flowing stops on the next line
// =========================================================================
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_burst() {
    const BURST: usize = 50_000;

    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    std::fs::write(&config.path, "").unwrap();

    let log = FrameLog::default();
    let cancel = CancellationToken::new();
    let mut driver = Driver::from_config(&config, log.clone());

    let producer_log = log.clone();
    let producer_cancel = cancel.clone();
    let path = config.path.clone();
    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let burst: String = (0..BURST)
            .map(|i| format!("{{\"author\":\"user{}\",\"sentiment\":0.{}}}\n", i % 5, i % 10))
            .collect();
        let mut out = LineAppender::open(&path).unwrap();
        out.append_raw(burst.as_bytes()).unwrap();
        while producer_log.len() == 0 {
            tokio::task::yield_now().await;
        }
        producer_cancel.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), driver.run(cancel))
        .await
        .expect("driver did not stop")
        .unwrap();
    producer.await.unwrap();

    let rendered = log.len();
    assert!(rendered > 0);
    assert!(rendered < BURST, "all {BURST} lines rendered despite cancellation");
    assert_eq!(summary.state.total_count(), rendered as u64);
    assert_eq!(driver.state(), DriverState::Stopped);
    assert!(*log.finalized.lock().unwrap());
}

// =========================================================================
// Whitespace-only lines are counted, never rejected
// =========================================================================
#[tokio::test]
async fn test_blank_lines_counted() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    std::fs::write(&config.path, "").unwrap();

    let log = FrameLog::default();
    let cancel = CancellationToken::new();
    let mut driver = Driver::from_config(&config, log.clone());

    let producer_log = log.clone();
    let producer_cancel = cancel.clone();
    let path = config.path.clone();
    let producer = tokio::spawn(async move {
        let mut out = LineAppender::open(&path).unwrap();
        out.append_raw(b"\n   \n{}\n").unwrap();
        wait_for_frames(&producer_log, 1).await;
        producer_cancel.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), driver.run(cancel))
        .await
        .expect("driver did not stop")
        .unwrap();
    producer.await.unwrap();

    assert_eq!(summary.metrics.blank, 2);
    assert_eq!(summary.metrics.lines_read, 3);
    assert_eq!(summary.metrics.accepted, 1);
    assert_eq!(summary.metrics.rejected, 0);
}
