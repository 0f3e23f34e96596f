//! MetadataEnrich stage (spec §4.g/§4.h boundary).
//!
//! Re-stats each file immediately before Parse reads it, so a context that
//! sat in a queue for a while (behind a slow upstream stage, or a watcher
//! debounce window) carries fresh `size`/`mtime` rather than whatever the
//! Scanner or Watcher observed at enqueue time. Delete events pass through
//! untouched — there's nothing left to stat. Re-checks the size cap too: a
//! file can cross it between being enqueued and reaching this stage.

use sift_core::PipelineFileContext;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::queue::{QueueItem, QueueSender, SharedReceiver};
use crate::MAX_FILE_BYTES;

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
) {
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
      Some(QueueItem::Item(mut ctx)) => {
        if !ctx.is_delete() {
          match tokio::fs::metadata(&ctx.abs_path).await {
            Ok(metadata) => {
              ctx.size = Some(metadata.len());
              ctx.mtime = metadata.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs_f64());
              if metadata.len() > MAX_FILE_BYTES && !ctx.has_errors() {
                debug!(worker_id, file_path = %ctx.file_path, size = metadata.len(), "metadata enrich: file exceeds size cap, marking invalid");
                ctx.push_error("size");
              }
            }
            Err(err) => {
              debug!(worker_id, file_path = %ctx.file_path, error = %err, "metadata enrich: file vanished before stat, dropping");
              continue;
            }
          }
        }

        if tx.put(ctx).await.is_err() {
          break;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "metadata enrich worker finished");
  let _ = done_tx.send(()).await;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::bounded_queue;
  use sift_core::EventType;
  use std::time::Duration;
  use tempfile::TempDir;

  #[tokio::test]
  async fn populates_fresh_size_and_mtime() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.py");
    std::fs::write(&path, "x = 1\n").unwrap();

    let (in_tx, in_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (out_tx, out_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);

    let mut ctx = PipelineFileContext::new("a.py", path, EventType::Create);
    ctx.size = None;
    ctx.mtime = None;
    in_tx.put(ctx).await.unwrap();
    in_tx.shutdown_one().await.unwrap();

    run_worker(0, in_rx, out_tx, done_tx, CancellationToken::new()).await;
    done_rx.recv().await;

    let mut guard = out_rx.lock().await;
    match guard.recv().await {
      Some(QueueItem::Item(ctx)) => {
        assert!(ctx.size.is_some());
        assert!(ctx.mtime.is_some());
      }
      other => panic!("expected Item, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn drops_context_for_vanished_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone.py");

    let (in_tx, in_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (out_tx, out_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);

    in_tx.put(PipelineFileContext::new("gone.py", missing, EventType::Create)).await.unwrap();
    in_tx.shutdown_one().await.unwrap();

    run_worker(0, in_rx, out_tx, done_tx, CancellationToken::new()).await;
    done_rx.recv().await;

    let mut guard = out_rx.lock().await;
    assert!(guard.recv().await.is_none());
  }

  #[tokio::test]
  async fn marks_invalid_when_file_has_grown_past_the_size_cap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.bin");
    std::fs::write(&path, vec![0u8; (crate::MAX_FILE_BYTES + 1) as usize]).unwrap();

    let (in_tx, in_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (out_tx, out_rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);

    in_tx.put(PipelineFileContext::new("huge.bin", path, EventType::Create)).await.unwrap();
    in_tx.shutdown_one().await.unwrap();

    run_worker(0, in_rx, out_tx, done_tx, CancellationToken::new()).await;
    done_rx.recv().await;

    let mut guard = out_rx.lock().await;
    match guard.recv().await {
      Some(QueueItem::Item(ctx)) => {
        assert!(ctx.has_errors());
        assert_eq!(ctx.errors, vec!["size".to_string()]);
      }
      other => panic!("expected Item, got {other:?}"),
    }
  }
}
