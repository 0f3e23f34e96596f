//! Wires concrete provider implementations from a resolved `Config`. Kept
//! separate from the commands so `index` and `watch` share one construction
//! path and never drift.

use std::sync::Arc;

use anyhow::{Context, Result};
use db::Storage;
use embedding::{wrap_resilient_arc, EmbeddingProvider, OllamaProvider, OpenRouterProvider, RetryConfig};
use llm::{HttpLlmProvider, LlmProvider};
use sift_core::Config;

pub fn build_llm_provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
  let provider = HttpLlmProvider::from_env(&config.llm.api_key_env)
    .context("resolving LLM API key from environment")?
    .with_base_url(config.llm.base_url.as_str())
    .with_model(config.llm.model.as_str());
  Ok(Arc::new(provider))
}

pub fn build_embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
  let retry = RetryConfig { max_attempts: config.embedding.max_retries.max(1), ..RetryConfig::default() };

  match config.embedding.provider.as_str() {
    "openrouter" => {
      let base = OpenRouterProvider::from_env().context("OPENROUTER_API_KEY not set")?;
      let base = base.with_model(config.embedding.model.as_str(), config.embedding.dimensions);
      Ok(wrap_resilient_arc(base, retry))
    }
    other => {
      if other != "ollama" {
        tracing::warn!(provider = other, "unknown embedding provider, falling back to ollama");
      }
      let base = OllamaProvider::new()
        .with_url(config.embedding.base_url.as_str())
        .with_model(config.embedding.model.as_str(), config.embedding.dimensions);
      Ok(wrap_resilient_arc(base, retry))
    }
  }
}

pub async fn open_storage(config: &Config) -> Result<Arc<Storage>> {
  let db_path = config.workspace.root.join(&config.storage.db_path);
  let storage = Storage::open(&db_path, config.embedding.dimensions).await.context("opening storage")?;
  Ok(Arc::new(storage))
}
