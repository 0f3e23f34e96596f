//! Persist stage (spec §4.k).
//!
//! Writes a file's chunks to the `chunks` table, delete-then-insert (there
//! is no native upsert in LanceDB — see `db::Storage::save_chunks`). A
//! context carrying (hard) errors has its stored chunks deleted rather than
//! left stale: a partial/failed parse means whatever chunks previously
//! existed for that path no longer reflect its content, so leaving them in
//! place would let retrieval serve stale results for a file the pipeline
//! knows it couldn't index. A context with no chunks (delete event, binary
//! file, empty file) clears whatever was stored for that path the same way.
//! Soft errors (e.g. an LLM enrichment failure recorded on `soft_errors`)
//! do not trigger this path — those chunks still embed and persist
//! normally; only FileSummary reads `soft_errors`, to mark the file
//! `valid=false` without discarding its index entry.

use std::sync::Arc;

use db::Storage;
use sift_core::PipelineFileContext;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::queue::{QueueItem, QueueSender, SharedReceiver};

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
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
      Some(QueueItem::Item(ctx)) => {
        persist_one(worker_id, &ctx, storage.as_ref()).await;
        if tx.put(ctx).await.is_err() {
          break;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "persist worker finished");
  let _ = done_tx.send(()).await;
}

async fn persist_one(worker_id: usize, ctx: &PipelineFileContext, storage: &Storage) {
  if ctx.has_errors() {
    warn!(worker_id, file_path = %ctx.file_path, "persist: context carries errors, deleting stored chunks");
    if let Err(err) = storage.delete_chunks_for_file(&ctx.file_path).await {
      warn!(worker_id, file_path = %ctx.file_path, error = %err, "persist: storage delete failed");
    }
    return;
  }

  let result = if ctx.is_delete() || ctx.chunks.is_empty() {
    storage.delete_chunks_for_file(&ctx.file_path).await
  } else {
    storage.save_chunks(&ctx.file_path, &ctx.chunks).await
  };

  if let Err(err) = result {
    warn!(worker_id, file_path = %ctx.file_path, error = %err, "persist: storage write failed");
  }
}
