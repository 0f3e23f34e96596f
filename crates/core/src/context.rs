use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// Why a file is moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  /// Produced by the Scanner during a bulk walk.
  Scan,
  /// Produced by the Watcher on filesystem create notifications.
  Create,
  /// Produced by the Watcher on filesystem modify notifications.
  Modify,
  /// Produced by the Watcher on filesystem delete/rename-away notifications.
  Delete,
}

/// Where a file stands after its last completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Pending,
  Success,
  Skipped,
  Error,
}

/// The single message type carried, and mutated in place, through every
/// pipeline stage. Stages append to `errors`/`chunks` and update `status`
/// rather than re-wrapping the file in a stage-specific message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFileContext {
  /// Path relative to the workspace root; stable identity used for chunk
  /// ids, dedup, and storage keys.
  pub file_path: String,
  pub abs_path: PathBuf,
  pub event_type: EventType,
  pub size: Option<u64>,
  /// Unix epoch seconds, matching the FileSummary metadata schema.
  pub mtime: Option<f64>,
  pub checksum: Option<String>,
  #[serde(default)]
  pub chunks: Vec<Chunk>,
  pub status: Status,
  #[serde(default)]
  pub errors: Vec<String>,
  /// Per-chunk failures that must not block persistence (e.g. an LLM
  /// enrichment call failing): chunks still embed/persist normally, but
  /// FileSummary records the file `valid=false` with these reasons. Kept
  /// separate from `errors`, which Persist treats as a hard failure and
  /// responds to by deleting the file's stored chunks.
  #[serde(default)]
  pub soft_errors: Vec<String>,
  /// Monotonic counter assigned at ingestion, used for diagnostics and log
  /// correlation only; no stage depends on sequence order across files.
  #[serde(default)]
  pub sequence: u64,
}

impl PipelineFileContext {
  pub fn new(file_path: impl Into<String>, abs_path: PathBuf, event_type: EventType) -> Self {
    Self {
      file_path: file_path.into(),
      abs_path,
      event_type,
      size: None,
      mtime: None,
      checksum: None,
      chunks: Vec::new(),
      status: Status::Pending,
      errors: Vec::new(),
      soft_errors: Vec::new(),
      sequence: 0,
    }
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn push_error(&mut self, err: impl std::fmt::Display) {
    self.errors.push(err.to_string());
    self.status = Status::Error;
  }

  pub fn has_soft_errors(&self) -> bool {
    !self.soft_errors.is_empty()
  }

  /// Records a non-fatal per-chunk failure (e.g. LLM enrichment). Unlike
  /// `push_error`, this does not flip `status` to `Error` and does not make
  /// Persist delete the file's chunks — only FileSummary reads it, to mark
  /// the file `valid=false` while still persisting the (unenriched) chunks.
  pub fn push_soft_error(&mut self, err: impl std::fmt::Display) {
    self.soft_errors.push(err.to_string());
  }

  /// Reasons a FileSummary row should be recorded `valid=false` for, or
  /// `None` if neither hard nor soft errors were recorded.
  pub fn invalid_reason(&self) -> Option<String> {
    if self.errors.is_empty() && self.soft_errors.is_empty() {
      return None;
    }
    Some(self.errors.iter().chain(self.soft_errors.iter()).cloned().collect::<Vec<_>>().join("; "))
  }

  pub fn mark_skipped(&mut self) {
    self.status = Status::Skipped;
  }

  pub fn mark_success(&mut self) {
    if !self.has_errors() {
      self.status = Status::Success;
    }
  }

  pub fn is_delete(&self) -> bool {
    self.event_type == EventType::Delete
  }
}
