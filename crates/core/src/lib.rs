pub mod chunk;
pub mod config;
pub mod context;
pub mod error;
pub mod file_summary;

pub use chunk::{compute_chunk_id, compute_content_hash, Chunk, ChunkType, Language, CHARS_PER_TOKEN};
pub use config::{
  ChunkingConfig, Config, EmbeddingConfig, LlmConfig, LogConfig, PipelineConfig, StorageConfig, WatcherConfig,
  WorkspaceConfig,
};
pub use context::{EventType, PipelineFileContext, Status};
pub use error::ConfigError;
pub use file_summary::{FileSummary, FileSummaryMetadata};
