//! The single queue primitive used for every inter-stage channel (spec §4.d).
//!
//! Built on `tokio::sync::mpsc`, with an explicit `QueueItem<T>` element type
//! rather than `Option<T>` — a poison-pill `Shutdown` is a first-class value,
//! per the Design Notes' guidance against nullable item types. A soft
//! throttle sleeps the producer briefly once the queue is more than 80% full,
//! ahead of the channel's own hard backpressure at 100%.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

use crate::error::{PipelineError, Result};

/// An item flowing through a `BoundedQueue`, or the shutdown signal.
#[derive(Debug)]
pub enum QueueItem<T> {
  Item(T),
  Shutdown,
}

/// The producer half. Cheap to clone — every stage worker that fans out to
/// the next stage holds its own clone.
#[derive(Clone)]
pub struct QueueSender<T> {
  tx: mpsc::Sender<QueueItem<T>>,
  capacity: usize,
  throttle_ratio: f64,
  throttle_delay: Duration,
}

/// The consumer half, already wrapped for multi-worker fan-out.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<QueueItem<T>>>>;

/// Creates one bounded queue. `capacity` is the channel's buffer size;
/// `throttle_ratio` (0.8 per the default) and `throttle_delay` configure the
/// soft-throttle `put` performs before a send once the queue is nearly full.
pub fn bounded_queue<T>(
  capacity: usize,
  throttle_ratio: f64,
  throttle_delay: Duration,
) -> (QueueSender<T>, SharedReceiver<T>) {
  let (tx, rx) = mpsc::channel(capacity);
  let sender = QueueSender { tx, capacity, throttle_ratio, throttle_delay };
  (sender, Arc::new(Mutex::new(rx)))
}

impl<T> QueueSender<T> {
  /// Current depth, derived from the channel's available-permit count
  /// (`capacity - available`), used both by the soft throttle and by the
  /// orchestrator's queue-depth telemetry.
  pub fn depth(&self) -> usize {
    self.capacity.saturating_sub(self.tx.capacity())
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Enqueues `item`, sleeping `throttle_delay` first if the queue is more
  /// than `throttle_ratio` full. Never drops work: a full queue blocks this
  /// call until a consumer drains it (hard backpressure at 100%).
  pub async fn put(&self, item: T) -> Result<()> {
    if self.depth() as f64 > self.throttle_ratio * self.capacity as f64 {
      sleep(self.throttle_delay).await;
    }
    self.tx.send(QueueItem::Item(item)).await.map_err(|_| PipelineError::ChannelClosed)
  }

  /// Sends one poison pill. The orchestrator calls this once per worker of
  /// the downstream stage so every worker observes a termination signal
  /// directly, rather than relying on channel-close semantics.
  pub async fn shutdown_one(&self) -> Result<()> {
    self.tx.send(QueueItem::Shutdown).await.map_err(|_| PipelineError::ChannelClosed)
  }
}

/// Tracks completion signals from a stage's worker pool. The last worker to
/// report done is responsible for forwarding shutdown downstream — mirrors
/// the teacher's `DoneTracker`, generalized from "forward one Done" to
/// "forward N poison pills, one per next-stage worker".
pub struct DoneTracker {
  expected: usize,
  received: usize,
}

impl DoneTracker {
  pub fn new(expected: usize) -> Self {
    Self { expected, received: 0 }
  }

  /// Records one worker's completion. Returns `true` exactly once, when the
  /// last expected worker has reported in.
  pub fn record_done(&mut self) -> bool {
    self.received += 1;
    self.received >= self.expected
  }
}

/// Shared aggregator body for every stage: collects one `()` per worker on
/// `done_rx`, and once every worker has reported in, sends one poison pill
/// per downstream worker so each of them observes a `Shutdown` directly
/// rather than relying on the channel simply closing.
pub async fn run_done_aggregator<T: Send>(worker_count: usize, mut done_rx: mpsc::Receiver<()>, out: QueueSender<T>, next_worker_count: usize) {
  let mut tracker = DoneTracker::new(worker_count);
  while done_rx.recv().await.is_some() {
    if tracker.record_done() {
      for _ in 0..next_worker_count {
        let _ = out.shutdown_one().await;
      }
      break;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_and_receive_round_trips() {
    let (tx, rx) = bounded_queue::<u32>(10, 0.8, Duration::from_millis(1));
    tx.put(42).await.unwrap();
    let mut rx = rx.lock().await;
    match rx.recv().await {
      Some(QueueItem::Item(v)) => assert_eq!(v, 42),
      other => panic!("expected Item, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn shutdown_is_a_distinct_variant_from_item() {
    let (tx, rx) = bounded_queue::<u32>(4, 0.8, Duration::from_millis(1));
    tx.shutdown_one().await.unwrap();
    let mut rx = rx.lock().await;
    assert!(matches!(rx.recv().await, Some(QueueItem::Shutdown)));
  }

  #[tokio::test]
  async fn depth_reflects_unconsumed_items() {
    let (tx, rx) = bounded_queue::<u32>(4, 0.8, Duration::from_millis(1));
    tx.put(1).await.unwrap();
    tx.put(2).await.unwrap();
    assert_eq!(tx.depth(), 2);
    let mut rx = rx.lock().await;
    rx.recv().await;
    drop(rx);
    assert_eq!(tx.depth(), 1);
  }

  #[test]
  fn done_tracker_fires_once_on_last_worker() {
    let mut tracker = DoneTracker::new(3);
    assert!(!tracker.record_done());
    assert!(!tracker.record_done());
    assert!(tracker.record_done());
  }

  #[tokio::test]
  async fn done_aggregator_sends_one_shutdown_per_downstream_worker() {
    let (done_tx, done_rx) = mpsc::channel(4);
    let (out_tx, out_rx) = bounded_queue::<u32>(10, 0.8, Duration::from_millis(1));

    for _ in 0..2 {
      done_tx.send(()).await.unwrap();
    }
    drop(done_tx);
    run_done_aggregator(2, done_rx, out_tx, 3).await;

    let mut rx = out_rx.lock().await;
    let mut shutdowns = 0;
    while let Ok(Some(QueueItem::Shutdown)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
      shutdowns += 1;
    }
    assert_eq!(shutdowns, 3);
  }
}
