use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read { path: String, #[source] source: std::io::Error },
  #[error("failed to parse config file {path}: {source}")]
  Parse { path: String, #[source] source: toml::de::Error },
  #[error("failed to serialize config: {0}")]
  Serialize(#[from] toml::ser::Error),
  #[error("failed to write config file {path}: {source}")]
  Write { path: String, #[source] source: std::io::Error },
  #[error("no user config directory available on this platform")]
  NoConfigDir,
}
