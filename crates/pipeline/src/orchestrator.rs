//! Pipeline orchestrator (spec §4.m).
//!
//! Wires the seven stage queues end to end, spawns each stage's worker pool
//! plus a `DoneTracker`-driven aggregator, and runs the Scanner and
//! (optionally) Watcher sources against the first queue. Mirrors the
//! teacher's `actor::pipeline::run_pipeline` channel-wiring shape,
//! generalized from its fixed five-stage layout to this pipeline's seven
//! stages and to an optional long-running watcher source.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use db::Storage;
use embedding::EmbeddingProvider;
use index::GitignoreMatcher;
use llm::LlmProvider;
use sift_core::{Config, PipelineFileContext};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lock::LlmLock;
use crate::queue::{bounded_queue, run_done_aggregator, QueueSender, SharedReceiver};
use crate::{scanner, stages, watcher};

/// A stage's worker pool plus the aggregator that forwards shutdown to the
/// next stage once every worker in this one is done.
struct Stage {
  workers: JoinHandle<()>,
  aggregator: JoinHandle<()>,
}

/// Owns every long-lived task the pipeline spawns, plus what it needs to
/// drive the Scanner/Watcher sources against the first queue. Dropping this
/// without calling [`shutdown`](PipelineHandle::shutdown) leaves the tasks
/// running detached; callers should always shut down explicitly.
pub struct PipelineHandle {
  cancel: CancellationToken,
  source_cancel: CancellationToken,
  root: PathBuf,
  gitignore: Arc<GitignoreMatcher>,
  first_queue: QueueSender<PipelineFileContext>,
  first_stage_workers: usize,
  watcher_task: Option<JoinHandle<()>>,
  monitor_task: JoinHandle<()>,
  stages: Vec<Stage>,
}

impl PipelineHandle {
  /// Runs a one-shot recursive scan as this pipeline's source, blocking
  /// until the walk completes.
  pub async fn run_scan_source(&self) {
    scanner::run_scan(&self.root, self.gitignore.clone(), self.first_queue.clone(), self.source_cancel.clone()).await;
  }

  /// Spawns the filesystem watcher as a long-running source. Returns
  /// immediately; the watcher keeps feeding the pipeline until
  /// [`shutdown`](Self::shutdown) cancels the source token.
  pub fn spawn_watch_source(&mut self, debounce: Duration) {
    let root = self.root.clone();
    let gitignore = self.gitignore.clone();
    let out = self.first_queue.clone();
    let cancel = self.source_cancel.clone();
    self.watcher_task = Some(tokio::spawn(async move {
      if let Err(err) = watcher::run_watch(root, gitignore, debounce, cancel, out).await {
        warn!(error = %err, "watcher source exited with an error");
      }
    }));
  }

  /// Graceful shutdown: stop the sources first, drain already-enqueued work
  /// through every stage via the poison-pill cascade, and fall back to a
  /// hard cancel if draining doesn't finish within `grace_period`.
  pub async fn shutdown(self, grace_period: Duration) {
    self.source_cancel.cancel();
    if let Some(task) = self.watcher_task {
      let _ = task.await;
    }

    for _ in 0..self.first_stage_workers {
      let _ = self.first_queue.shutdown_one().await;
    }

    let drain = async {
      for stage in self.stages {
        let _ = stage.workers.await;
        let _ = stage.aggregator.await;
      }
    };

    if tokio::time::timeout(grace_period, drain).await.is_err() {
      debug!("orchestrator: drain exceeded grace period, cancelling stragglers");
      self.cancel.cancel();
    }

    self.monitor_task.abort();
  }
}

/// Builds every inter-stage queue and spawns every stage's worker pool plus
/// aggregator, returning the handle the caller drives sources through.
pub async fn spawn(
  root: impl AsRef<Path>,
  config: &Config,
  storage: Arc<Storage>,
  llm_provider: Arc<dyn LlmProvider>,
  embedding_provider: Arc<dyn EmbeddingProvider>,
  llm_lock: LlmLock,
  cancel: CancellationToken,
) -> PipelineHandle {
  let root = root.as_ref().to_path_buf();
  let workers = config.pipeline.workers.max(1);
  let capacity = config.pipeline.queue_capacity;
  let throttle_ratio = config.pipeline.throttle_ratio;
  let throttle_delay = Duration::from_millis(config.pipeline.throttle_delay_ms as u64);

  let mk_queue = || bounded_queue::<PipelineFileContext>(capacity, throttle_ratio, throttle_delay);

  let (filter_tx, filter_rx) = mk_queue();
  let (metadata_tx, metadata_rx) = mk_queue();
  let (parse_tx, parse_rx) = mk_queue();
  let (enrich_tx, enrich_rx) = mk_queue();
  let (embed_tx, embed_rx) = mk_queue();
  let (persist_tx, persist_rx) = mk_queue();
  let (summary_tx, summary_rx) = mk_queue();

  let mut pipeline_stages = Vec::new();

  let filter = Arc::new(stages::incremental_filter::IncrementalFilter::load(storage.as_ref()).await);
  pipeline_stages.push(spawn_stage(workers, filter_rx, metadata_tx.clone(), workers, &cancel, move |worker_id, rx, tx, done_tx, cancel| {
    let filter = filter.clone();
    tokio::spawn(async move { stages::incremental_filter::run_worker(worker_id, rx, tx, done_tx, cancel, filter).await })
  }));

  pipeline_stages.push(spawn_stage(workers, metadata_rx, parse_tx.clone(), workers, &cancel, |worker_id, rx, tx, done_tx, cancel| {
    tokio::spawn(async move { stages::metadata_enrich::run_worker(worker_id, rx, tx, done_tx, cancel).await })
  }));

  pipeline_stages.push(spawn_stage(workers, parse_rx, enrich_tx.clone(), workers, &cancel, |worker_id, rx, tx, done_tx, cancel| {
    tokio::spawn(async move { stages::parse::run_worker(worker_id, rx, tx, done_tx, cancel).await })
  }));

  let enrich_timeout = config.llm.timeout_secs;
  pipeline_stages.push(spawn_stage(workers, enrich_rx, embed_tx.clone(), workers, &cancel, move |worker_id, rx, tx, done_tx, cancel| {
    let provider = llm_provider.clone();
    let lock = llm_lock.clone();
    tokio::spawn(async move { stages::chunk_enrich::run_worker(worker_id, rx, tx, done_tx, cancel, provider, lock, enrich_timeout).await })
  }));

  pipeline_stages.push(spawn_stage(workers, embed_rx, persist_tx.clone(), workers, &cancel, move |worker_id, rx, tx, done_tx, cancel| {
    let provider = embedding_provider.clone();
    tokio::spawn(async move { stages::embed::run_worker(worker_id, rx, tx, done_tx, cancel, provider).await })
  }));

  pipeline_stages.push(spawn_stage(workers, persist_rx, summary_tx.clone(), workers, &cancel, {
    let storage = storage.clone();
    move |worker_id, rx, tx, done_tx, cancel| {
      let storage = storage.clone();
      tokio::spawn(async move { stages::persist::run_worker(worker_id, rx, tx, done_tx, cancel, storage).await })
    }
  }));

  pipeline_stages.push(spawn_terminal_stage(workers, summary_rx, &cancel, {
    let storage = storage.clone();
    move |worker_id, rx, done_tx, cancel| {
      let storage = storage.clone();
      tokio::spawn(async move { stages::file_summary::run_worker(worker_id, rx, done_tx, cancel, storage).await })
    }
  }));

  let gitignore = Arc::new(GitignoreMatcher::new(&root));
  let source_cancel = cancel.child_token();
  let monitor_task = spawn_monitor(vec![metadata_tx, parse_tx, enrich_tx, embed_tx, persist_tx, summary_tx]);

  PipelineHandle {
    cancel,
    source_cancel,
    root,
    gitignore,
    first_queue: filter_tx,
    first_stage_workers: workers,
    watcher_task: None,
    monitor_task,
    stages: pipeline_stages,
  }
}

fn spawn_stage<F>(
  worker_count: usize,
  rx: SharedReceiver<PipelineFileContext>,
  next: QueueSender<PipelineFileContext>,
  next_worker_count: usize,
  cancel: &CancellationToken,
  spawn_worker: F,
) -> Stage
where
  F: Fn(usize, SharedReceiver<PipelineFileContext>, QueueSender<PipelineFileContext>, mpsc::Sender<()>, CancellationToken) -> JoinHandle<()>,
{
  let (done_tx, done_rx) = mpsc::channel::<()>(worker_count.max(1));
  let mut handles = Vec::with_capacity(worker_count);
  for worker_id in 0..worker_count {
    handles.push(spawn_worker(worker_id, rx.clone(), next.clone(), done_tx.clone(), cancel.child_token()));
  }
  drop(done_tx);

  let workers = tokio::spawn(async move {
    for handle in handles {
      let _ = handle.await;
    }
  });
  let aggregator = tokio::spawn(run_done_aggregator(worker_count, done_rx, next, next_worker_count));

  Stage { workers, aggregator }
}

/// Like `spawn_stage`, but for a stage with no outbound queue (FileSummary):
/// the "aggregator" just drains the done-signal channel so the handle's
/// shutdown sequence has something uniform to await.
fn spawn_terminal_stage<F>(worker_count: usize, rx: SharedReceiver<PipelineFileContext>, cancel: &CancellationToken, spawn_worker: F) -> Stage
where
  F: Fn(usize, SharedReceiver<PipelineFileContext>, mpsc::Sender<()>, CancellationToken) -> JoinHandle<()>,
{
  let (done_tx, mut done_rx) = mpsc::channel::<()>(worker_count.max(1));
  let mut handles = Vec::with_capacity(worker_count);
  for worker_id in 0..worker_count {
    handles.push(spawn_worker(worker_id, rx.clone(), done_tx.clone(), cancel.child_token()));
  }
  drop(done_tx);

  let workers = tokio::spawn(async move {
    for handle in handles {
      let _ = handle.await;
    }
  });
  let aggregator = tokio::spawn(async move { while done_rx.recv().await.is_some() {} });

  Stage { workers, aggregator }
}

/// Logs queue depth/capacity for every stage boundary every ten seconds,
/// the pipeline's only telemetry surface (spec §4.m).
fn spawn_monitor(queues: Vec<QueueSender<PipelineFileContext>>) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
      interval.tick().await;
      for (i, queue) in queues.iter().enumerate() {
        info!(stage = i, depth = queue.depth(), capacity = queue.capacity(), "pipeline queue depth");
      }
    }
  })
}

/// One-shot convenience wrapper: spawns the pipeline, runs a single scan to
/// completion, then shuts down gracefully.
pub async fn index_once(
  root: impl AsRef<Path>,
  config: &Config,
  storage: Arc<Storage>,
  llm_provider: Arc<dyn LlmProvider>,
  embedding_provider: Arc<dyn EmbeddingProvider>,
  llm_lock: LlmLock,
) {
  let cancel = CancellationToken::new();
  let handle = spawn(root, config, storage, llm_provider, embedding_provider, llm_lock, cancel).await;
  handle.run_scan_source().await;
  handle.shutdown(Duration::from_secs(30)).await;
}
