//! ChunkEnrich stage (spec §4.i).
//!
//! Asks the configured LLM provider for a `summary`/`purpose` pair per
//! chunk. Waits on the shared `LlmLock` before every call so a user-facing
//! generation always wins contention for LLM capacity. A failed or timed
//! out call is non-fatal: the chunk keeps flowing with `summary`/`purpose`
//! left `None` rather than failing the whole file.

use std::sync::Arc;
use std::time::Duration;

use llm::{LlmProvider, build_chunk_enrich_prompt, parse_summary_purpose};
use sift_core::PipelineFileContext;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::lock::LlmLock;
use crate::queue::{QueueItem, QueueSender, SharedReceiver};

/// How often `wait_unlocked` re-checks the lock while parked.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
  provider: Arc<dyn LlmProvider>,
  lock: LlmLock,
  timeout_secs: u64,
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
          enrich_chunks(worker_id, &mut ctx, provider.as_ref(), &lock, timeout_secs).await;
        }
        if tx.put(ctx).await.is_err() {
          break;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "chunk enrich worker finished");
  let _ = done_tx.send(()).await;
}

async fn enrich_chunks(worker_id: usize, ctx: &mut PipelineFileContext, provider: &dyn LlmProvider, lock: &LlmLock, timeout_secs: u64) {
  let mut soft_errors = Vec::new();

  for chunk in &mut ctx.chunks {
    lock.wait_unlocked(LOCK_POLL_INTERVAL).await;

    let prompt = build_chunk_enrich_prompt(&chunk.file_path, chunk.chunk_type.as_str(), &chunk.content);
    let request = llm::InferenceRequest::new(prompt).with_timeout_secs(timeout_secs);

    match tokio::time::timeout(Duration::from_secs(timeout_secs), provider.infer(request)).await {
      Ok(Ok(response)) => {
        let (summary, purpose) = parse_summary_purpose(&response.text);
        chunk.summary = summary;
        chunk.purpose = purpose;
      }
      Ok(Err(err)) => {
        warn!(worker_id, chunk_id = %chunk.id, error = %err, "chunk enrich: llm call failed, leaving summary/purpose unset");
        soft_errors.push(format!("llm enrichment failed: {err}"));
      }
      Err(_) => {
        debug!(worker_id, chunk_id = %chunk.id, "chunk enrich: llm call timed out, leaving summary/purpose unset");
        soft_errors.push("llm enrichment timed out".to_string());
      }
    }
  }

  for err in soft_errors {
    ctx.push_soft_error(err);
  }
}
