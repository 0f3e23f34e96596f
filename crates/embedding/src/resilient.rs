// Retry wrapper for embedding providers: exponential backoff with jitter,
// matching the backoff curve used by the LLM client's own retry loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryConfig {
  fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let exponential = self.base_delay.saturating_mul(1 << attempt.min(8));
    let capped = exponential.min(self.max_delay);
    let jitter_ms = fastrand_jitter_ms(capped.as_millis() as u64);
    capped.saturating_sub(Duration::from_millis(jitter_ms))
  }
}

/// Cheap deterministic-ish jitter (up to 25% of the delay) without pulling
/// in a dedicated RNG crate for one call site.
fn fastrand_jitter_ms(base_ms: u64) -> u64 {
  let quarter = base_ms / 4;
  if quarter == 0 {
    return 0;
  }
  let nanos = std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.subsec_nanos() as u64)
    .unwrap_or(0);
  nanos % quarter
}

/// An embedding provider wrapper that retries transient failures with
/// exponential backoff, per `EmbeddingError::is_retryable`.
pub struct ResilientProvider<P: EmbeddingProvider> {
  inner: P,
  config: RetryConfig,
}

impl<P: EmbeddingProvider> ResilientProvider<P> {
  pub fn new(provider: P) -> Self {
    Self { inner: provider, config: RetryConfig::default() }
  }

  pub fn with_config(provider: P, config: RetryConfig) -> Self {
    Self { inner: provider, config }
  }

  async fn retry<T, F, Fut>(&self, op: F) -> Result<T, EmbeddingError>
  where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, EmbeddingError>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(err) if attempt + 1 < self.config.max_attempts && is_retryable_error(&err) => {
          let delay = self.config.delay_for_attempt(attempt);
          warn!(attempt, ?delay, error = %err, "retrying embedding request");
          sleep(delay).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }
}

/// Whether retrying is worth it for this error. Delegates to the error's
/// own classification; kept as a free function so callers that only have a
/// `&EmbeddingError` (not a `ResilientProvider`) can reuse it.
pub fn is_retryable_error(err: &EmbeddingError) -> bool {
  err.is_retryable()
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for ResilientProvider<P> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    self.retry(|| self.inner.embed(text)).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    self.retry(|| self.inner.embed_batch(texts)).await
  }

  async fn is_available(&self) -> bool {
    self.inner.is_available().await
  }
}

pub fn wrap_resilient<P: EmbeddingProvider>(provider: P, config: RetryConfig) -> ResilientProvider<P> {
  ResilientProvider::with_config(provider, config)
}

pub fn wrap_resilient_arc<P: EmbeddingProvider + 'static>(provider: P, config: RetryConfig) -> Arc<dyn EmbeddingProvider> {
  Arc::new(ResilientProvider::with_config(provider, config))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct FlakyProvider {
    calls: AtomicUsize,
    fail_times: usize,
  }

  #[async_trait]
  impl EmbeddingProvider for FlakyProvider {
    fn name(&self) -> &str {
      "flaky"
    }
    fn model_id(&self) -> &str {
      "flaky-model"
    }
    fn dimensions(&self) -> usize {
      4
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if call < self.fail_times {
        Err(EmbeddingError::ProviderError("transient".to_string()))
      } else {
        Ok(vec![0.0; 4])
      }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }

    async fn is_available(&self) -> bool {
      true
    }
  }

  #[tokio::test]
  async fn retries_until_success_within_max_attempts() {
    let provider = FlakyProvider { calls: AtomicUsize::new(0), fail_times: 2 };
    let resilient = ResilientProvider::with_config(
      provider,
      RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) },
    );
    let result = resilient.embed("x").await;
    assert!(result.is_ok());
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let provider = FlakyProvider { calls: AtomicUsize::new(0), fail_times: 10 };
    let resilient = ResilientProvider::with_config(
      provider,
      RetryConfig { max_attempts: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) },
    );
    let result = resilient.embed("x").await;
    assert!(result.is_err());
  }

  #[test]
  fn dimension_mismatch_is_not_retryable() {
    let err = EmbeddingError::DimensionMismatch { expected: 768, actual: 384 };
    assert!(!is_retryable_error(&err));
  }

  #[test]
  fn provider_error_is_retryable() {
    let err = EmbeddingError::ProviderError("boom".to_string());
    assert!(is_retryable_error(&err));
  }
}
