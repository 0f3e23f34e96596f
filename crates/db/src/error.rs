use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
  #[error("database connection error: {0}")]
  Connection(#[from] lancedb::Error),
  #[error("arrow schema error: {0}")]
  Schema(#[from] arrow::error::ArrowError),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, DbError>;
