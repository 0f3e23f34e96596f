//! FileSummary stage (spec §4.l).
//!
//! The pipeline's terminal stage: writes one `FileSummary` row per file to
//! the `file_summaries` table, keyed by an MD5 checksum of the file's bytes
//! (deliberately distinct from the SHA-256 `compute_content_hash` the Parse
//! stage uses — see `sift_core::file_summary`). A context carrying hard or
//! soft errors still gets a row, marked invalid with the recorded reason(s),
//! so the next scan doesn't keep silently retrying a file that can't be
//! read or enriched; a delete event removes the row instead.

use std::sync::Arc;

use db::Storage;
use md5::{Digest, Md5};
use sift_core::{FileSummary, FileSummaryMetadata, PipelineFileContext};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::queue::{QueueItem, SharedReceiver};

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
  storage: Arc<Storage>,
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
      Some(QueueItem::Item(ctx)) => summarize_one(worker_id, ctx, storage.as_ref()).await,
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "file summary worker finished");
  let _ = done_tx.send(()).await;
}

async fn summarize_one(worker_id: usize, ctx: PipelineFileContext, storage: &Storage) {
  if ctx.is_delete() {
    if let Err(err) = storage.delete_file_summary(&ctx.file_path).await {
      warn!(worker_id, file_path = %ctx.file_path, error = %err, "file summary: delete failed");
    }
    return;
  }

  let bytes = match tokio::fs::read(&ctx.abs_path).await {
    Ok(bytes) => bytes,
    Err(err) => {
      debug!(worker_id, file_path = %ctx.file_path, error = %err, "file summary: file no longer exists, skipping");
      return;
    }
  };

  let checksum = md5_hex(&bytes);
  let size = ctx.size.unwrap_or(bytes.len() as u64);
  let mtime = ctx.mtime.unwrap_or(0.0);

  let metadata = match ctx.invalid_reason() {
    Some(reason) => FileSummaryMetadata::invalid(mtime, checksum, size, reason),
    None => FileSummaryMetadata::valid(mtime, checksum, size),
  };

  let summary_text = summary_text_for(&ctx);
  let summary = FileSummary::new(ctx.file_path.clone(), summary_text, metadata);

  if let Err(err) = storage.save_file_summary(&summary).await {
    warn!(worker_id, file_path = %ctx.file_path, error = %err, "file summary: save failed");
  }
}

/// A short, file-level summary built from the per-chunk summaries
/// ChunkEnrich already produced, rather than a separate LLM call — the
/// reference implementation's file summary is explicitly a cheap rollup,
/// not its own enrichment pass.
fn summary_text_for(ctx: &PipelineFileContext) -> String {
  let parts: Vec<&str> = ctx.chunks.iter().filter_map(|c| c.summary.as_deref()).take(3).collect();
  parts.join(" ")
}

fn md5_hex(bytes: &[u8]) -> String {
  let mut hasher = Md5::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::bounded_queue;
  use sift_core::EventType;
  use std::time::Duration;
  use tempfile::TempDir;

  async fn open_storage() -> (TempDir, Arc<Storage>) {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("test.lance"), 4).await.unwrap();
    (dir, Arc::new(storage))
  }

  #[tokio::test]
  async fn writes_a_valid_summary_for_a_clean_context() {
    let (dir, storage) = open_storage().await;
    let path = dir.path().join("a.py");
    std::fs::write(&path, "x = 1\n").unwrap();

    let mut ctx = PipelineFileContext::new("a.py", path, EventType::Scan);
    ctx.mark_success();

    let (tx, rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);
    tx.put(ctx).await.unwrap();
    tx.shutdown_one().await.unwrap();

    run_worker(0, rx, done_tx, CancellationToken::new(), storage.clone()).await;
    done_rx.recv().await;

    let saved = storage.get_file_summary("a.py").await.unwrap().unwrap();
    assert!(saved.metadata.valid);
  }

  #[tokio::test]
  async fn writes_an_invalid_summary_with_reason_when_context_has_errors() {
    let (dir, storage) = open_storage().await;
    let path = dir.path().join("a.py");
    std::fs::write(&path, "x = 1\n").unwrap();

    let mut ctx = PipelineFileContext::new("a.py", path, EventType::Scan);
    ctx.push_error("splitter failed");

    let (tx, rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);
    tx.put(ctx).await.unwrap();
    tx.shutdown_one().await.unwrap();

    run_worker(0, rx, done_tx, CancellationToken::new(), storage.clone()).await;
    done_rx.recv().await;

    let saved = storage.get_file_summary("a.py").await.unwrap().unwrap();
    assert!(!saved.metadata.valid);
    assert_eq!(saved.metadata.invalid_reason.as_deref(), Some("splitter failed"));
  }

  #[tokio::test]
  async fn writes_an_invalid_summary_for_soft_errors_only() {
    let (dir, storage) = open_storage().await;
    let path = dir.path().join("a.py");
    std::fs::write(&path, "x = 1\n").unwrap();

    let mut ctx = PipelineFileContext::new("a.py", path, EventType::Scan);
    ctx.push_soft_error("llm enrichment failed");
    ctx.mark_success();

    let (tx, rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);
    tx.put(ctx).await.unwrap();
    tx.shutdown_one().await.unwrap();

    run_worker(0, rx, done_tx, CancellationToken::new(), storage.clone()).await;
    done_rx.recv().await;

    let saved = storage.get_file_summary("a.py").await.unwrap().unwrap();
    assert!(!saved.metadata.valid);
    assert_eq!(saved.metadata.invalid_reason.as_deref(), Some("llm enrichment failed"));
  }

  #[tokio::test]
  async fn delete_event_removes_existing_summary() {
    let (dir, storage) = open_storage().await;
    let path = dir.path().join("a.py");
    std::fs::write(&path, "x = 1\n").unwrap();
    storage
      .save_file_summary(&FileSummary::new("a.py", "old", FileSummaryMetadata::valid(1.0, "abc", 1)))
      .await
      .unwrap();

    let delete_ctx = PipelineFileContext::new("a.py", path, EventType::Delete);
    let (tx, rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let (done_tx, mut done_rx) = mpsc::channel(1);
    tx.put(delete_ctx).await.unwrap();
    tx.shutdown_one().await.unwrap();

    run_worker(0, rx, done_tx, CancellationToken::new(), storage.clone()).await;
    done_rx.recv().await;

    assert!(storage.get_file_summary("a.py").await.unwrap().is_none());
  }
}
