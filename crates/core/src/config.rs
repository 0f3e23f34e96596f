use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_queue_capacity() -> usize {
  1000
}

fn default_throttle_ratio() -> f64 {
  0.8
}

fn default_throttle_delay_ms() -> u64 {
  1
}

fn default_batch_size() -> usize {
  100
}

fn default_debounce_ms() -> u64 {
  500
}

fn default_workers() -> usize {
  num_cpus::get().max(1)
}

/// Queue sizing, soft-throttle, and stage worker-pool parameters shared by
/// every stage in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub queue_capacity: usize,
  /// Fraction of `queue_capacity` at which a producer starts sleeping
  /// between puts.
  pub throttle_ratio: f64,
  pub throttle_delay_ms: u64,
  /// Number of chunks (ChunkEnrich) or contexts (Embed) buffered before a
  /// forced flush, independent of the debounce timeout.
  pub batch_size: usize,
  /// Forced-flush timeout for a partially-filled batch.
  pub batch_debounce_ms: u64,
  /// Worker count for CPU-bound stages (Parse, ChunkEnrich splitting).
  pub workers: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      queue_capacity: default_queue_capacity(),
      throttle_ratio: default_throttle_ratio(),
      throttle_delay_ms: default_throttle_delay_ms(),
      batch_size: default_batch_size(),
      batch_debounce_ms: default_debounce_ms(),
      workers: default_workers(),
    }
  }
}

fn default_lock_ttl_secs() -> u64 {
  300
}

fn default_llm_timeout_secs() -> u64 {
  60
}

fn default_llm_model() -> String {
  "gpt-4o-mini".to_string()
}

/// The chat-completions-compatible summarizer used by ChunkEnrich, plus the
/// process-wide lock's TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  pub base_url: String,
  pub model: String,
  pub api_key_env: String,
  pub timeout_secs: u64,
  /// How long a lock acquisition is honored before it is treated as
  /// abandoned and auto-released.
  pub lock_ttl_secs: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.openai.com/v1".to_string(),
      model: default_llm_model(),
      api_key_env: "OPENAI_API_KEY".to_string(),
      timeout_secs: default_llm_timeout_secs(),
      lock_ttl_secs: default_lock_ttl_secs(),
    }
  }
}

fn default_embedding_model() -> String {
  "nomic-embed-text".to_string()
}

fn default_embedding_dims() -> usize {
  768
}

fn default_max_input_chars() -> usize {
  8000
}

/// The embedding provider used by the Embed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  /// "ollama" or "openrouter"; resolved to a concrete `EmbeddingProvider` by
  /// the `embedding` crate.
  pub provider: String,
  pub base_url: String,
  pub model: String,
  pub api_key_env: String,
  pub dimensions: usize,
  pub max_input_chars: usize,
  pub max_retries: u32,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      provider: "ollama".to_string(),
      base_url: "http://localhost:11434".to_string(),
      model: default_embedding_model(),
      api_key_env: "OPENROUTER_API_KEY".to_string(),
      dimensions: default_embedding_dims(),
      max_input_chars: default_max_input_chars(),
      max_retries: 3,
    }
  }
}

fn default_db_path() -> String {
  ".sift/index.lance".to_string()
}

/// Where and under what table names the Persist/FileSummary stages write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Relative to the workspace root unless absolute.
  pub db_path: String,
  pub chunks_table: String,
  pub file_summaries_table: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      db_path: default_db_path(),
      chunks_table: "chunks".to_string(),
      file_summaries_table: "file_summaries".to_string(),
    }
  }
}

/// Filesystem watch behavior for the Watcher source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
  pub enabled: bool,
  /// How long to wait after the last event on a path before treating a
  /// burst of notifications as settled.
  pub debounce_ms: u64,
  /// Extra ignore patterns on top of the built-in global set and the
  /// workspace's `.gitignore`.
  pub extra_ignore_patterns: Vec<String>,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self { enabled: true, debounce_ms: default_debounce_ms(), extra_ignore_patterns: Vec::new() }
  }
}

fn default_target_lines() -> usize {
  50
}

fn default_min_lines() -> usize {
  10
}

fn default_max_lines() -> usize {
  150
}

/// Splitter sizing for the Parse stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
  pub target_lines: usize,
  pub min_lines: usize,
  pub max_lines: usize,
  pub use_ast_chunking: bool,
}

impl Default for ChunkingConfig {
  fn default() -> Self {
    Self {
      target_lines: default_target_lines(),
      min_lines: default_min_lines(),
      max_lines: default_max_lines(),
      use_ast_chunking: true,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

/// Console/file dual-mode logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  pub level: String,
  /// When set, logs go to a non-blocking rolling file here instead of the
  /// console (used when the process is run as a background daemon).
  pub file_dir: Option<PathBuf>,
  pub json: bool,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self { level: default_log_level(), file_dir: None, json: false }
  }
}

/// Which directory this pipeline indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
  pub root: PathBuf,
}

impl Default for WorkspaceConfig {
  fn default() -> Self {
    Self { root: PathBuf::from(".") }
  }
}

/// Root configuration, composed of one sub-config per concern. Every
/// sub-config has its own `Default`, so a partial TOML file only needs to
/// name the fields it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub workspace: WorkspaceConfig,
  pub pipeline: PipelineConfig,
  pub llm: LlmConfig,
  pub embedding: EmbeddingConfig,
  pub storage: StorageConfig,
  pub watcher: WatcherConfig,
  pub chunking: ChunkingConfig,
  pub log: LogConfig,
}

const PROJECT_CONFIG_RELATIVE: &str = ".sift/config.toml";
const USER_CONFIG_SUBDIR: &str = "sift";
const USER_CONFIG_FILE: &str = "config.toml";

impl Config {
  /// Resolves config by trying, in order: a project-relative
  /// `.sift/config.toml` under `project_root`, then a user config directory
  /// (`$XDG_CONFIG_HOME`/`dirs::config_dir()`), then built-in defaults.
  pub fn load_for_project(project_root: &Path) -> Result<Self, ConfigError> {
    let project_path = Self::project_config_path(project_root);
    if project_path.exists() {
      return Self::load_from(&project_path);
    }
    let user_path = Self::user_config_path()?;
    if user_path.exists() {
      return Self::load_from(&user_path);
    }
    let mut config = Self::default();
    config.workspace.root = project_root.to_path_buf();
    Ok(config)
  }

  fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path)
      .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
  }

  pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_RELATIVE)
  }

  pub fn user_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(USER_CONFIG_SUBDIR).join(USER_CONFIG_FILE))
  }

  /// Renders the current config (typically `Config::default()`) as a TOML
  /// template a user can hand-edit, used by the CLI's `config init`.
  pub fn generate_template(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }

  pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|source| ConfigError::Write { path: path.display().to_string(), source })?;
    }
    let rendered = self.generate_template()?;
    std::fs::write(path, rendered).map_err(|source| ConfigError::Write { path: path.display().to_string(), source })
  }
}
