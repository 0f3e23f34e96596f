// Rate limiter for API providers with sliding window rate limiting
//
// Implements a sliding window rate limiter that tracks requests over a
// configurable time window and delays requests when the limit is reached.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
  /// Maximum requests allowed in the window
  pub max_requests: usize,
  /// Time window duration
  pub window: Duration,
  /// Maximum time to wait for a slot before failing
  pub max_wait: Duration,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_requests: 70,
      window: Duration::from_secs(10),
      max_wait: Duration::from_secs(30),
    }
  }
}

impl RateLimitConfig {
  /// Create a config for OpenRouter (50 requests per 10s sliding window)
  /// OpenRouter's actual limit is 70/10s, but we use 50 for safety margin.
  pub fn for_openrouter() -> Self {
    Self {
      max_requests: 50,
      window: Duration::from_secs(10),
      max_wait: Duration::from_secs(60),
    }
  }

  /// Create a config with custom limits
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      max_requests,
      window,
      max_wait: Duration::from_secs(30),
    }
  }

  /// Set the maximum wait time
  pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
    self.max_wait = max_wait;
    self
  }
}

/// Sliding window rate limiter
#[derive(Debug)]
pub struct SlidingWindowLimiter {
  config: RateLimitConfig,
  /// Timestamps of recent requests (within the window)
  request_times: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    let capacity = config.max_requests + 1;
    Self {
      config,
      request_times: VecDeque::with_capacity(capacity),
    }
  }

  /// Remove expired timestamps from the window
  fn prune_expired(&mut self) {
    let cutoff = Instant::now() - self.config.window;
    while let Some(&oldest) = self.request_times.front() {
      if oldest < cutoff {
        self.request_times.pop_front();
      } else {
        break;
      }
    }
  }

  /// Check if we can make a request now, and if not, how long to wait
  fn check_and_wait_time(&mut self) -> Option<Duration> {
    self.prune_expired();

    if self.request_times.len() < self.config.max_requests {
      // Under the limit, can proceed immediately
      None
    } else {
      // At the limit - calculate when the oldest request will expire
      if let Some(&oldest) = self.request_times.front() {
        let expires_at = oldest + self.config.window;
        let now = Instant::now();
        if expires_at > now { Some(expires_at - now) } else { None }
      } else {
        None
      }
    }
  }

  /// Record that a request was made
  fn record_request(&mut self) {
    self.request_times.push_back(Instant::now());
  }

  /// Check if a slot is available and record the request if so.
  /// Returns None if slot was acquired, or Some(wait_time) if we need to wait.
  pub fn check_and_record(&mut self) -> Option<Duration> {
    let wait = self.check_and_wait_time();
    if wait.is_none() {
      self.record_request();
    }
    wait
  }

  /// Get the current request count in the window
  fn current_count(&mut self) -> usize {
    self.prune_expired();
    self.request_times.len()
  }
}

/// A rate-limited embedding provider that wraps another provider
pub struct RateLimitedProvider<P: EmbeddingProvider> {
  inner: P,
  limiter: Arc<Mutex<SlidingWindowLimiter>>,
  config: RateLimitConfig,
}

impl<P: EmbeddingProvider> RateLimitedProvider<P> {
  pub fn new(provider: P) -> Self {
    let config = RateLimitConfig::default();
    Self {
      inner: provider,
      limiter: Arc::new(Mutex::new(SlidingWindowLimiter::new(config.clone()))),
      config,
    }
  }

  pub fn with_config(provider: P, config: RateLimitConfig) -> Self {
    Self {
      inner: provider,
      limiter: Arc::new(Mutex::new(SlidingWindowLimiter::new(config.clone()))),
      config,
    }
  }

  /// Wait for a rate limit slot, returning error if max wait time exceeded
  async fn acquire_slot(&self) -> Result<(), EmbeddingError> {
    let start = Instant::now();

    loop {
      let wait_time = {
        let mut limiter = self.limiter.lock().await;
        limiter.check_and_wait_time()
      };

      match wait_time {
        None => {
          // Slot available, record the request
          let mut limiter = self.limiter.lock().await;
          limiter.record_request();
          debug!(
            "Rate limiter: acquired slot ({}/{} in window)",
            limiter.current_count(),
            self.config.max_requests
          );
          return Ok(());
        }
        Some(wait) => {
          // Check if we've exceeded max wait time
          if start.elapsed() + wait > self.config.max_wait {
            warn!("Rate limiter: max wait time exceeded ({:?})", self.config.max_wait);
            return Err(EmbeddingError::ProviderError(format!(
              "Rate limit wait time exceeded ({:?})",
              self.config.max_wait
            )));
          }

          debug!("Rate limiter: waiting {:?} for slot", wait);
          sleep(wait).await;
        }
      }
    }
  }
}

#[async_trait]
impl<P: EmbeddingProvider + Send + Sync> EmbeddingProvider for RateLimitedProvider<P> {
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
    self.acquire_slot().await?;
    self.inner.embed(text).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    // Each batch request counts as one API call
    self.acquire_slot().await?;
    self.inner.embed_batch(texts).await
  }

  async fn is_available(&self) -> bool {
    self.inner.is_available().await
  }
}

/// Wrap any embedding provider with rate limiting
pub fn wrap_rate_limited<P: EmbeddingProvider>(provider: P, config: RateLimitConfig) -> RateLimitedProvider<P> {
  RateLimitedProvider::with_config(provider, config)
}
