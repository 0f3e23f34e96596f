use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
  #[error("http request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("provider error: {0}")]
  ProviderError(String),
  #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },
  #[error("input too large: {chars} chars exceeds limit of {limit}")]
  InputTooLarge { chars: usize, limit: usize },
}

impl EmbeddingError {
  /// Whether a retry is worth attempting: network-level failures and 5xx/429
  /// are retryable, anything that looks like a client or contract error is
  /// not.
  pub fn is_retryable(&self) -> bool {
    match self {
      EmbeddingError::Request(e) => e.is_timeout() || e.is_connect() || e.status().is_none_or(|s| s.is_server_error() || s.as_u16() == 429),
      EmbeddingError::ProviderError(_) => true,
      EmbeddingError::DimensionMismatch { .. } | EmbeddingError::InputTooLarge { .. } => false,
    }
  }
}

/// An HTTP-backed embedding service. One text in, one vector out; batches
/// are a provider-side optimization, not a separate contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  /// The schema-declared vector width this provider produces, checked
  /// against storage at startup.
  fn dimensions(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

  async fn is_available(&self) -> bool;
}
