use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage error: {0}")]
  Db(#[from] db::DbError),
  #[error("embedding error: {0}")]
  Embedding(#[from] embedding::EmbeddingError),
  #[error("llm error: {0}")]
  Llm(#[from] llm::LlmError),
  #[error("watcher error: {0}")]
  Watch(#[from] notify::Error),
  #[error("downstream stage is no longer accepting work")]
  ChannelClosed,
  #[error("embedding dimension mismatch: schema declares {expected}, provider reports {actual}")]
  DimensionMismatch { expected: usize, actual: usize },
}

impl PipelineError {
  /// Per §7's taxonomy: transient I/O/network conditions are retryable;
  /// contract violations (dimension mismatch) are fatal at startup.
  pub fn is_retryable(&self) -> bool {
    match self {
      PipelineError::Db(_) | PipelineError::Io(_) | PipelineError::Watch(_) => true,
      PipelineError::Embedding(e) => e.is_retryable(),
      PipelineError::Llm(e) => e.is_retryable(),
      PipelineError::ChannelClosed | PipelineError::DimensionMismatch { .. } => false,
    }
  }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
