//! The two externally reachable control points for the LLM lock (spec §6):
//! a minimal HTTP surface a running `watch` process exposes so an agent in
//! another process can pause/resume indexer LLM usage.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pipeline::{LlmLock, LockStatus};
use serde::Deserialize;

#[derive(Clone)]
struct AppState {
  lock: LlmLock,
}

#[derive(Deserialize)]
struct SetLockRequest {
  locked: bool,
  ttl_seconds: f64,
}

async fn set_lock(State(state): State<AppState>, Json(body): Json<SetLockRequest>) -> Json<LockStatus> {
  state.lock.set_lock(body.locked, Duration::from_secs_f64(body.ttl_seconds.max(0.0))).await;
  Json(state.lock.status().await)
}

async fn read_lock(State(state): State<AppState>) -> Json<LockStatus> {
  Json(state.lock.status().await)
}

fn router(lock: LlmLock) -> Router {
  Router::new().route("/lock", post(set_lock).get(read_lock)).with_state(AppState { lock })
}

/// Serves the control plane on `addr` until `cancel` is triggered.
pub async fn serve(addr: SocketAddr, lock: LlmLock, cancel: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  tracing::info!(%addr, "control plane listening");
  axum::serve(listener, router(lock)).with_graceful_shutdown(async move { cancel.cancelled().await }).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::Body;
  use axum::http::{Method, Request, StatusCode};
  use tower::ServiceExt;

  #[tokio::test]
  async fn set_then_read_round_trips_through_http() {
    let lock = LlmLock::new();
    let app = router(lock);

    let set_req = Request::builder()
      .method(Method::POST)
      .uri("/lock")
      .header("content-type", "application/json")
      .body(Body::from(r#"{"locked": true, "ttl_seconds": 30}"#))
      .unwrap();
    let response = app.clone().oneshot(set_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let read_req = Request::builder().method(Method::GET).uri("/lock").body(Body::empty()).unwrap();
    let response = app.oneshot(read_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let status: LockStatus = serde_json::from_slice(&bytes).unwrap();
    assert!(status.locked);
  }
}
