//! `sift watch` — startup scan followed by a long-running filesystem
//! watcher, with the control plane serving the LLM lock for the duration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use sift_core::Config;
use tokio_util::sync::CancellationToken;

use crate::{control_plane, providers};

pub async fn cmd_watch(config: Config, control_addr: SocketAddr) -> Result<()> {
  let root = config.workspace.root.clone();
  let storage = providers::open_storage(&config).await?;
  let llm_provider = providers::build_llm_provider(&config)?;
  let embedding_provider = providers::build_embedding_provider(&config)?;
  let llm_lock = pipeline::LlmLock::new();

  // The pipeline's own `CancellationToken` is only a hard-cancel fallback
  // past `shutdown`'s grace period; the control plane's listener gets its
  // own token so Ctrl-C can stop it without touching pipeline internals.
  let control_cancel = CancellationToken::new();
  let control_task = tokio::spawn(control_plane::serve(control_addr, llm_lock.clone(), control_cancel.clone()));

  let mut handle =
    pipeline::spawn(&root, &config, storage, llm_provider, embedding_provider, llm_lock, CancellationToken::new()).await;

  tracing::info!(root = %root.display(), "running startup scan");
  handle.run_scan_source().await;

  if config.watcher.enabled {
    tracing::info!(debounce_ms = config.watcher.debounce_ms, "starting filesystem watcher");
    handle.spawn_watch_source(Duration::from_millis(config.watcher.debounce_ms));
  }

  tokio::signal::ctrl_c().await?;
  tracing::info!("shutdown requested, draining pipeline");

  handle.shutdown(Duration::from_secs(30)).await;
  control_cancel.cancel();
  let _ = control_task.await;

  Ok(())
}
