use serde::{Deserialize, Serialize};

/// Per-file metadata recorded alongside a `FileSummary`, used by future runs
/// to decide whether a previously-summarized file still reflects what's on
/// disk. `checksum` here is MD5 hex, per the FileSummary stage's contract —
/// a deliberate departure from the SHA-256 used elsewhere in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummaryMetadata {
  pub mtime: f64,
  pub checksum: String,
  pub size: u64,
  pub valid: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invalid_reason: Option<String>,
}

impl FileSummaryMetadata {
  pub fn valid(mtime: f64, checksum: impl Into<String>, size: u64) -> Self {
    Self { mtime, checksum: checksum.into(), size, valid: true, invalid_reason: None }
  }

  pub fn invalid(mtime: f64, checksum: impl Into<String>, size: u64, reason: impl Into<String>) -> Self {
    Self { mtime, checksum: checksum.into(), size, valid: false, invalid_reason: Some(reason.into()) }
  }
}

/// A whole-file digest, keyed by `file_path`, written by the FileSummary
/// stage once per successfully-parsed file. Distinct from a `Chunk`: there
/// is exactly one `FileSummary` per file regardless of how many chunks it
/// produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
  pub file_path: String,
  pub summary: String,
  pub metadata: FileSummaryMetadata,
}

impl FileSummary {
  pub fn new(file_path: impl Into<String>, summary: impl Into<String>, metadata: FileSummaryMetadata) -> Self {
    Self { file_path: file_path.into(), summary: summary.into(), metadata }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_summary_carries_a_reason() {
    let meta = FileSummaryMetadata::invalid(0.0, "deadbeef", 0, "empty file");
    assert!(!meta.valid);
    assert_eq!(meta.invalid_reason.as_deref(), Some("empty file"));
  }

  #[test]
  fn valid_summary_has_no_reason() {
    let meta = FileSummaryMetadata::valid(123.0, "deadbeef", 42);
    assert!(meta.valid);
    assert!(meta.invalid_reason.is_none());
  }
}
