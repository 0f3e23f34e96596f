//! Process-wide LLM exclusion lock (spec §4.b).
//!
//! The agent calls `set_lock(true, ttl)` before a user-facing generation so
//! the indexer yields LLM capacity; the TTL prevents deadlock if the agent
//! crashes without releasing it. ChunkEnrich is the only stage that waits on
//! this — every other stage is oblivious to its existence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
struct LockState {
  locked: bool,
  ttl: Duration,
  locked_at: Instant,
}

impl Default for LockState {
  fn default() -> Self {
    Self { locked: false, ttl: Duration::ZERO, locked_at: Instant::now() }
  }
}

/// Snapshot returned by [`LlmLock::status`] for the control-plane read
/// endpoint, mirroring the reference implementation's `get_status()`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct LockStatus {
  pub locked: bool,
  pub ttl_seconds: f64,
  pub locked_at_elapsed_seconds: f64,
}

/// A shared, TTL-bounded exclusion flag. Clone and pass the handle to any
/// stage that needs it rather than reaching for ambient global state.
#[derive(Clone)]
pub struct LlmLock {
  state: Arc<Mutex<LockState>>,
}

impl Default for LlmLock {
  fn default() -> Self {
    Self::new()
  }
}

impl LlmLock {
  pub fn new() -> Self {
    Self { state: Arc::new(Mutex::new(LockState::default())) }
  }

  /// Atomic set. `locked_at` resets to now whenever `locked` transitions to
  /// `true`, restarting the TTL window.
  pub async fn set_lock(&self, locked: bool, ttl: Duration) {
    let mut state = self.state.lock().await;
    state.locked = locked;
    state.ttl = ttl;
    if locked {
      state.locked_at = Instant::now();
    }
  }

  /// `false` once `now - locked_at > ttl`, even if the flag is still `true` —
  /// TTL auto-expiry, so a crashed agent can never wedge the indexer.
  pub async fn is_locked(&self) -> bool {
    let state = self.state.lock().await;
    state.locked && state.locked_at.elapsed() <= state.ttl
  }

  /// Cooperative spin-wait: polls `is_locked` and sleeps `check_interval`
  /// between checks until it returns `false`. Not a condvar — this matches
  /// both the spec's "cooperative spin-wait" wording and the reference
  /// implementation's `asyncio.sleep` loop.
  pub async fn wait_unlocked(&self, check_interval: Duration) {
    while self.is_locked().await {
      sleep(check_interval).await;
    }
  }

  pub async fn status(&self) -> LockStatus {
    let state = self.state.lock().await;
    LockStatus {
      locked: state.locked && state.locked_at.elapsed() <= state.ttl,
      ttl_seconds: state.ttl.as_secs_f64(),
      locked_at_elapsed_seconds: state.locked_at.elapsed().as_secs_f64(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn unlocked_by_default() {
    let lock = LlmLock::new();
    assert!(!lock.is_locked().await);
  }

  #[tokio::test]
  async fn set_lock_is_observed_immediately() {
    let lock = LlmLock::new();
    lock.set_lock(true, Duration::from_secs(300)).await;
    assert!(lock.is_locked().await);
  }

  #[tokio::test]
  async fn ttl_auto_expires_even_without_explicit_unlock() {
    let lock = LlmLock::new();
    lock.set_lock(true, Duration::from_millis(10)).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!lock.is_locked().await);
  }

  #[tokio::test]
  async fn wait_unlocked_returns_once_unlocked() {
    let lock = LlmLock::new();
    lock.set_lock(true, Duration::from_millis(20)).await;
    tokio::time::timeout(Duration::from_secs(1), lock.wait_unlocked(Duration::from_millis(5)))
      .await
      .expect("wait_unlocked should return once the TTL lapses");
  }

  #[tokio::test]
  async fn status_reports_ttl_and_locked_flag() {
    let lock = LlmLock::new();
    lock.set_lock(true, Duration::from_secs(5)).await;
    let status = lock.status().await;
    assert!(status.locked);
    assert_eq!(status.ttl_seconds, 5.0);
  }
}
