//! Embed stage (spec §4.j).
//!
//! Batches a file's chunks (at most `EMBED_BATCH_SIZE` per request) and
//! calls the embedding provider once per batch. The reference
//! implementation's embedder accumulates batches across files with a
//! timer-driven flush; this pipeline's unit of work is already a whole
//! file's chunk list, so batching collapses to slicing that list — no
//! cross-file accumulation or flush timer is needed.

use embedding::EmbeddingProvider;
use sift_core::PipelineFileContext;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::queue::{QueueItem, QueueSender, SharedReceiver};

const EMBED_BATCH_SIZE: usize = 10;

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
  provider: std::sync::Arc<dyn EmbeddingProvider>,
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
        if !ctx.is_delete() && !ctx.chunks.is_empty() {
          embed_chunks(worker_id, &mut ctx, provider.as_ref()).await;
        }
        if tx.put(ctx).await.is_err() {
          break;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "embed worker finished");
  let _ = done_tx.send(()).await;
}

/// One failed batch does not poison the rest of the file: the remaining
/// batches still get embedded, and the failure is recorded on the context
/// so Persist/FileSummary can reflect a partial result.
async fn embed_chunks(worker_id: usize, ctx: &mut PipelineFileContext, provider: &dyn EmbeddingProvider) {
  let len = ctx.chunks.len();
  let mut start = 0;

  while start < len {
    let end = (start + EMBED_BATCH_SIZE).min(len);
    let texts: Vec<String> = ctx.chunks[start..end].iter().map(|c| c.embedding_input()).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

    match provider.embed_batch(&refs).await {
      Ok(vectors) if vectors.len() == refs.len() => {
        for (chunk, vector) in ctx.chunks[start..end].iter_mut().zip(vectors) {
          chunk.embedding = Some(vector);
        }
      }
      Ok(vectors) => {
        ctx.push_error(format!("embed batch returned {} vectors for {} inputs", vectors.len(), refs.len()));
      }
      Err(err) => {
        warn!(worker_id, file_path = %ctx.file_path, error = %err, "embed: batch failed");
        ctx.push_error(format!("embed batch failed: {err}"));
      }
    }

    start = end;
  }

  ctx.mark_success();
}
