//! Long-running native filesystem watcher (spec §4.f).
//!
//! Bridges `notify`'s synchronous callback into the async world via a
//! channel, debounces bursts of events per path, and emits settled
//! `PipelineFileContext`s. Runs until cancelled or the event channel closes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use index::GitignoreMatcher;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use sift_core::{EventType, PipelineFileContext};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::queue::QueueSender;
use crate::MAX_FILE_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
  Created,
  Modified,
  Deleted,
}

struct PendingChange {
  kind: ChangeKind,
  last_event: Instant,
}

impl PendingChange {
  fn new(kind: ChangeKind) -> Self {
    Self { kind, last_event: Instant::now() }
  }

  /// Coalesces a new event into an existing pending change for the same
  /// path. Create-then-delete cancels back out to a delete (so a file
  /// created and removed within one debounce window still cleans up any
  /// stale index entry); anything else takes the latest kind.
  fn update(&mut self, kind: ChangeKind) {
    self.last_event = Instant::now();
    self.kind = match (self.kind, kind) {
      (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
      (ChangeKind::Deleted, ChangeKind::Created) => ChangeKind::Modified,
      (ChangeKind::Created, ChangeKind::Deleted) => ChangeKind::Deleted,
      (_, latest) => latest,
    };
  }
}

impl ChangeKind {
  fn into_event_type(self) -> EventType {
    match self {
      ChangeKind::Created => EventType::Create,
      ChangeKind::Modified => EventType::Modify,
      ChangeKind::Deleted => EventType::Delete,
    }
  }
}

/// Watches `root` recursively, debouncing events by `debounce` before
/// emitting them onto `out`. `notify`'s recursive mode already tracks new
/// subdirectories on this platform's backend; what this loop still has to do
/// on its own is load any `.gitignore` a newly-created directory carries, and
/// filter events through it.
pub async fn run_watch(
  root: impl AsRef<Path>,
  gitignore: Arc<GitignoreMatcher>,
  debounce: Duration,
  cancel: CancellationToken,
  out: QueueSender<PipelineFileContext>,
) -> Result<(), notify::Error> {
  let root = root.as_ref().to_path_buf();
  let (event_tx, mut event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

  let mut watcher = RecommendedWatcher::new(
    move |res| {
      let _ = event_tx.blocking_send(res);
    },
    notify::Config::default(),
  )?;
  watcher.watch(&root, RecursiveMode::Recursive)?;
  info!(root = %root.display(), "watcher: started");

  let sequence = AtomicU64::new(0);
  let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
  let mut debounce_interval = tokio::time::interval(debounce);

  loop {
    tokio::select! {
      biased;

      _ = cancel.cancelled() => {
        debug!("watcher: cancelled");
        break;
      }

      event = event_rx.recv() => {
        match event {
          Some(Ok(event)) => process_event(&root, &gitignore, &mut pending, event),
          Some(Err(err)) => warn!(error = %err, "watcher: event stream error"),
          None => {
            debug!("watcher: event channel closed");
            break;
          }
        }
      }

      _ = debounce_interval.tick() => {
        flush_settled(&root, &mut pending, debounce, &sequence, &out).await;
      }
    }
  }

  if !pending.is_empty() {
    debug!(pending = pending.len(), "watcher: flushing remaining changes on shutdown");
    flush_all(&root, &mut pending, &sequence, &out).await;
  }

  // `_watcher` drops here, deregistering OS watches; best-effort per spec.
  drop(watcher);
  Ok(())
}

fn process_event(root: &Path, gitignore: &GitignoreMatcher, pending: &mut HashMap<PathBuf, PendingChange>, event: Event) {
  for path in &event.paths {
    let is_dir = path.is_dir();

    if is_dir {
      if matches!(event.kind, EventKind::Create(_)) {
        gitignore.load_dir(path);
      }
      continue;
    }

    if gitignore.should_ignore(path, false) {
      trace!(path = %path.display(), "watcher: ignoring path");
      continue;
    }

    let kind = match event.kind {
      EventKind::Create(_) => ChangeKind::Created,
      EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::From)) => ChangeKind::Deleted,
      EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::To)) => ChangeKind::Created,
      EventKind::Modify(_) => ChangeKind::Modified,
      EventKind::Remove(_) => ChangeKind::Deleted,
      EventKind::Access(_) | EventKind::Any | EventKind::Other => continue,
    };

    let _ = root;
    match pending.get_mut(path) {
      Some(existing) => existing.update(kind),
      None => {
        pending.insert(path.clone(), PendingChange::new(kind));
      }
    }
  }
}

async fn flush_settled(
  root: &Path,
  pending: &mut HashMap<PathBuf, PendingChange>,
  debounce: Duration,
  sequence: &AtomicU64,
  out: &QueueSender<PipelineFileContext>,
) {
  let now = Instant::now();
  let settled: Vec<PathBuf> =
    pending.iter().filter(|(_, change)| now.duration_since(change.last_event) >= debounce).map(|(p, _)| p.clone()).collect();

  for path in settled {
    if let Some(change) = pending.remove(&path) {
      emit(root, path, change, sequence, out).await;
    }
  }
}

async fn flush_all(root: &Path, pending: &mut HashMap<PathBuf, PendingChange>, sequence: &AtomicU64, out: &QueueSender<PipelineFileContext>) {
  for (path, change) in pending.drain() {
    emit(root, path, change, sequence, out).await;
  }
}

async fn emit(root: &Path, path: PathBuf, change: PendingChange, sequence: &AtomicU64, out: &QueueSender<PipelineFileContext>) {
  let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().to_string();
  let mut ctx = PipelineFileContext::new(relative, path.clone(), change.kind.into_event_type());
  ctx.sequence = sequence.fetch_add(1, Ordering::Relaxed);

  if !ctx.is_delete() {
    if let Ok(metadata) = tokio::fs::metadata(&path).await {
      ctx.size = Some(metadata.len());
      ctx.mtime = metadata.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs_f64());
      if metadata.len() > MAX_FILE_BYTES {
        debug!(path = %path.display(), size = metadata.len(), "watcher: file exceeds size cap, marking invalid");
        ctx.push_error("size");
      }
    }
  }

  if out.put(ctx).await.is_err() {
    debug!("watcher: downstream closed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_then_modify_coalesces_to_create() {
    let mut change = PendingChange::new(ChangeKind::Created);
    change.update(ChangeKind::Modified);
    assert_eq!(change.kind, ChangeKind::Created);
  }

  #[test]
  fn delete_then_create_coalesces_to_modify() {
    let mut change = PendingChange::new(ChangeKind::Deleted);
    change.update(ChangeKind::Created);
    assert_eq!(change.kind, ChangeKind::Modified);
  }

  #[test]
  fn create_then_delete_coalesces_to_delete() {
    let mut change = PendingChange::new(ChangeKind::Created);
    change.update(ChangeKind::Deleted);
    assert_eq!(change.kind, ChangeKind::Deleted);
  }

  #[tokio::test]
  async fn watch_and_settle_emits_a_create_context() {
    use crate::queue::{bounded_queue, QueueItem};
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let gitignore = Arc::new(GitignoreMatcher::new(dir.path()));
    let cancel = CancellationToken::new();
    let (tx, rx) = bounded_queue(100, 0.8, Duration::from_millis(1));

    let watch_cancel = cancel.clone();
    let root = dir.path().to_path_buf();
    let handle = tokio::spawn(async move { run_watch(root, gitignore, Duration::from_millis(20), watch_cancel, tx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(dir.path().join("new.py"), "x = 1\n").unwrap();

    let ctx = tokio::time::timeout(Duration::from_secs(2), async {
      loop {
        let mut guard = rx.lock().await;
        if let Some(QueueItem::Item(ctx)) = guard.recv().await {
          return ctx;
        }
      }
    })
    .await
    .expect("expected a create context within timeout");

    assert_eq!(ctx.file_path, "new.py");
    assert_eq!(ctx.event_type, EventType::Create);

    cancel.cancel();
    let _ = handle.await;
  }

  #[tokio::test]
  async fn emit_marks_oversized_files_invalid() {
    use crate::queue::{bounded_queue, QueueItem};
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.bin");
    std::fs::write(&path, vec![0u8; (MAX_FILE_BYTES + 1) as usize]).unwrap();

    let (tx, rx) = bounded_queue(10, 0.8, Duration::from_millis(1));
    let sequence = AtomicU64::new(0);
    emit(dir.path(), path, PendingChange::new(ChangeKind::Created), &sequence, &tx).await;

    let mut guard = rx.lock().await;
    match guard.recv().await {
      Some(QueueItem::Item(ctx)) => {
        assert!(ctx.has_errors());
        assert_eq!(ctx.errors, vec!["size".to_string()]);
      }
      other => panic!("expected Item, got {other:?}"),
    }
  }
}
