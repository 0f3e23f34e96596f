//! IncrementalFilter stage (spec §4.g).
//!
//! Drops Scan-sourced contexts whose mtime hasn't moved since the last
//! recorded `FileSummary`, so an unchanged file never reaches Parse/
//! ChunkEnrich/Embed. Watcher-sourced events always pass through — they
//! already represent a real filesystem change, there's nothing to compare.
//!
//! The reference implementation batches the known-mtime lookup per scan
//! batch; here `db::Storage::load_known_mtimes` returns the whole table in
//! one round trip, so the batching collapses to loading that snapshot once
//! when the stage starts rather than querying per file or per batch.

use std::collections::HashMap;
use std::sync::Arc;

use sift_core::{EventType, PipelineFileContext};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::queue::{QueueItem, QueueSender, SharedReceiver};

/// Two mtimes within this many seconds of each other are treated as the
/// same write — guards against filesystem timestamp truncation/jitter.
const MTIME_EPSILON_SECS: f64 = 0.010;

pub struct IncrementalFilter {
  known_mtimes: HashMap<String, f64>,
}

impl IncrementalFilter {
  /// Loads the snapshot once. On a storage error, forwards everything for
  /// the remainder of the run rather than risk silently dropping real
  /// changes (conservative forward-on-DB-error per §7).
  pub async fn load(storage: &db::Storage) -> Self {
    let known_mtimes = match storage.load_known_mtimes().await {
      Ok(mtimes) => mtimes,
      Err(err) => {
        warn!(error = %err, "incremental filter: failed to load known mtimes, forwarding everything this run");
        HashMap::new()
      }
    };
    Self { known_mtimes }
  }

  pub fn should_forward(&self, ctx: &PipelineFileContext) -> bool {
    if ctx.event_type != EventType::Scan {
      return true;
    }
    match (self.known_mtimes.get(&ctx.file_path), ctx.mtime) {
      (Some(known), Some(current)) => current > known + MTIME_EPSILON_SECS,
      _ => true,
    }
  }
}

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
  filter: Arc<IncrementalFilter>,
) {
  let mut forwarded = 0usize;
  let mut skipped = 0usize;

  loop {
    let msg = {
      let mut guard = rx.lock().await;
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        msg = guard.recv() => msg,
      }
    };

    match msg {
      Some(QueueItem::Item(ctx)) => {
        if filter.should_forward(&ctx) {
          if tx.put(ctx).await.is_err() {
            break;
          }
          forwarded += 1;
        } else {
          trace!(worker_id, file_path = %ctx.file_path, "incremental filter: unchanged, dropping");
          skipped += 1;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, forwarded, skipped, "incremental filter worker finished");
  let _ = done_tx.send(()).await;
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn filter_with(known: &[(&str, f64)]) -> IncrementalFilter {
    IncrementalFilter { known_mtimes: known.iter().map(|(k, v)| (k.to_string(), *v)).collect() }
  }

  fn scan_ctx(path: &str, mtime: f64) -> PipelineFileContext {
    let mut ctx = PipelineFileContext::new(path, PathBuf::from(path), EventType::Scan);
    ctx.mtime = Some(mtime);
    ctx
  }

  #[test]
  fn unchanged_mtime_is_dropped() {
    let filter = filter_with(&[("a.py", 100.0)]);
    assert!(!filter.should_forward(&scan_ctx("a.py", 100.0)));
  }

  #[test]
  fn changed_mtime_is_forwarded() {
    let filter = filter_with(&[("a.py", 100.0)]);
    assert!(filter.should_forward(&scan_ctx("a.py", 200.0)));
  }

  #[test]
  fn unknown_file_is_forwarded() {
    let filter = filter_with(&[]);
    assert!(filter.should_forward(&scan_ctx("new.py", 1.0)));
  }

  #[test]
  fn jitter_within_epsilon_is_dropped() {
    let filter = filter_with(&[("a.py", 100.0)]);
    assert!(!filter.should_forward(&scan_ctx("a.py", 100.005)));
  }

  #[test]
  fn mtime_moved_backward_is_dropped() {
    // e.g. a VCS checkout of an older commit, or clock skew — the DB mtime
    // is still >= current mtime, so the file must not be forwarded
    // (Invariant 4).
    let filter = filter_with(&[("a.py", 100.0)]);
    assert!(!filter.should_forward(&scan_ctx("a.py", 50.0)));
  }

  #[test]
  fn watcher_events_always_forward() {
    let filter = filter_with(&[("a.py", 100.0)]);
    let mut ctx = PipelineFileContext::new("a.py", PathBuf::from("a.py"), EventType::Modify);
    ctx.mtime = Some(100.0);
    assert!(filter.should_forward(&ctx));
  }
}
