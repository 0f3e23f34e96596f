//! `sift lock set` / `sift lock status` — thin HTTP clients against a
//! running `watch` process's control plane (spec §6).

use anyhow::{Context, Result};
use pipeline::LockStatus;
use serde_json::json;

pub async fn cmd_lock_set(url: &str, locked: bool, ttl_seconds: f64) -> Result<()> {
  let client = reqwest::Client::new();
  let response = client
    .post(format!("{url}/lock"))
    .json(&json!({ "locked": locked, "ttl_seconds": ttl_seconds }))
    .send()
    .await
    .context("sending lock request")?
    .error_for_status()
    .context("control plane rejected lock request")?;
  let status: LockStatus = response.json().await.context("decoding lock status")?;
  print_status(&status);
  Ok(())
}

pub async fn cmd_lock_status(url: &str) -> Result<()> {
  let client = reqwest::Client::new();
  let status: LockStatus = client
    .get(format!("{url}/lock"))
    .send()
    .await
    .context("reading lock status")?
    .error_for_status()
    .context("control plane rejected status request")?
    .json()
    .await
    .context("decoding lock status")?;
  print_status(&status);
  Ok(())
}

fn print_status(status: &LockStatus) {
  println!(
    "locked={} ttl_seconds={:.1} locked_at_elapsed_seconds={:.1}",
    status.locked, status.ttl_seconds, status.locked_at_elapsed_seconds
  );
}
