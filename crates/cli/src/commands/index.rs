//! `sift index` — one-shot recursive scan.

use anyhow::Result;
use sift_core::Config;
use tokio_util::sync::CancellationToken;

use crate::providers;

pub async fn cmd_index(config: Config) -> Result<()> {
  let root = config.workspace.root.clone();
  let storage = providers::open_storage(&config).await?;
  let llm_provider = providers::build_llm_provider(&config)?;
  let embedding_provider = providers::build_embedding_provider(&config)?;
  let llm_lock = pipeline::LlmLock::new();

  let handle = pipeline::spawn(&root, &config, storage.clone(), llm_provider, embedding_provider, llm_lock, CancellationToken::new()).await;
  handle.run_scan_source().await;
  handle.shutdown(std::time::Duration::from_secs(30)).await;

  let summaries = storage.list_file_summaries().await?;
  tracing::info!(files = summaries.len(), "index complete");
  println!("indexed {} files under {}", summaries.len(), root.display());
  Ok(())
}
