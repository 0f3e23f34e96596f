//! One-shot recursive workspace walk (spec §4.e).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use index::GitignoreMatcher;
use sift_core::{EventType, PipelineFileContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::queue::QueueSender;
use crate::MAX_FILE_BYTES;

/// Walks `root`, loading each directory's `.gitignore` as it is entered and
/// pruning ignored subtrees from traversal entirely (never descended, so a
/// huge ignored directory costs nothing beyond a single `stat`). Emits one
/// `PipelineFileContext` per remaining regular file with `event_type=Scan`.
///
/// Does not send a poison pill on completion — the orchestrator owns
/// lifecycle and decides when the first stage has seen its last source.
/// `cancel` is checked between entries so a shutdown request can abort a
/// walk still in progress, rather than only taking effect once it's done.
pub async fn run_scan(root: impl AsRef<Path>, gitignore: Arc<GitignoreMatcher>, out: QueueSender<PipelineFileContext>, cancel: CancellationToken) {
  let root = root.as_ref().to_path_buf();
  let sequence = AtomicU64::new(0);
  let mut emitted = 0usize;

  let walker = WalkDir::new(&root).follow_links(true).into_iter().filter_entry(|entry| {
    let is_dir = entry.file_type().is_dir();
    if is_dir && entry.depth() > 0 {
      gitignore.load_dir(entry.path());
    }
    !gitignore.should_ignore(entry.path(), is_dir)
  });

  for entry in walker {
    if cancel.is_cancelled() {
      debug!("scanner: cancelled mid-walk");
      break;
    }

    let entry = match entry {
      Ok(e) => e,
      Err(err) => {
        warn!(error = %err, "scanner: directory read failed, pruning subtree");
        continue;
      }
    };

    if !entry.file_type().is_file() {
      continue;
    }

    let abs_path = entry.path().to_path_buf();
    let metadata = match tokio::fs::metadata(&abs_path).await {
      Ok(m) => m,
      Err(err) => {
        debug!(path = %abs_path.display(), error = %err, "scanner: stat failed, skipping");
        continue;
      }
    };

    let relative = abs_path.strip_prefix(&root).unwrap_or(&abs_path).to_string_lossy().to_string();
    let mut ctx = PipelineFileContext::new(relative, abs_path, EventType::Scan);
    ctx.sequence = sequence.fetch_add(1, Ordering::Relaxed);
    ctx.size = Some(metadata.len());
    ctx.mtime = metadata.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs_f64());

    if metadata.len() > MAX_FILE_BYTES {
      debug!(path = %ctx.abs_path.display(), size = metadata.len(), "scanner: file exceeds size cap, marking invalid");
      ctx.push_error("size");
    }

    if out.put(ctx).await.is_err() {
      debug!("scanner: downstream closed, stopping early");
      break;
    }
    emitted += 1;
  }

  debug!(emitted, root = %root.display(), "scanner: walk complete");
}
