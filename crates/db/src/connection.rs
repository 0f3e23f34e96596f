use std::path::{Path, PathBuf};

use lancedb::{connect, Connection};
use tracing::{debug, info};

use crate::error::{DbError, Result};
use crate::schema::{chunks_schema, file_summaries_schema};

pub const CHUNKS_TABLE: &str = "chunks";
pub const FILE_SUMMARIES_TABLE: &str = "file_summaries";

/// The concrete realization of the storage port: a LanceDB connection plus
/// the embedding dimension chunks are stored at. There is no upsert in
/// LanceDB, so every write path below uses delete-then-insert.
pub struct Storage {
  pub connection: Connection,
  pub vector_dim: usize,
}

impl Storage {
  pub async fn open(db_path: impl AsRef<Path>, vector_dim: usize) -> Result<Self> {
    let db_path: PathBuf = db_path.as_ref().to_path_buf();
    if let Some(parent) = db_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    info!(path = %db_path.display(), vector_dim, "opening storage connection");
    let connection = connect(db_path.to_string_lossy().as_ref()).execute().await?;

    let storage = Self { connection, vector_dim };
    storage.ensure_tables().await?;
    Ok(storage)
  }

  async fn ensure_tables(&self) -> Result<()> {
    let existing = self.connection.table_names().execute().await?;
    debug!(existing = existing.len(), "checking required tables");

    if !existing.iter().any(|t| t == CHUNKS_TABLE) {
      debug!(table = CHUNKS_TABLE, "creating table");
      self
        .connection
        .create_empty_table(CHUNKS_TABLE, chunks_schema(self.vector_dim))
        .execute()
        .await?;
    }

    if !existing.iter().any(|t| t == FILE_SUMMARIES_TABLE) {
      debug!(table = FILE_SUMMARIES_TABLE, "creating table");
      self
        .connection
        .create_empty_table(FILE_SUMMARIES_TABLE, file_summaries_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  pub async fn chunks_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(CHUNKS_TABLE).execute().await?)
  }

  pub async fn file_summaries_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(FILE_SUMMARIES_TABLE).execute().await?)
  }

  /// Reports the schema-declared vector width, used at startup to validate
  /// it against the embedding service's own probe.
  pub fn embedding_dimension(&self) -> usize {
    self.vector_dim
  }
}

/// Escapes a string for safe interpolation into a LanceDB SQL predicate.
/// Never build a `.only_if()`/`.delete()` filter without passing identifiers
/// through this first.
pub fn escape_sql_literal(value: &str) -> String {
  value.replace('\'', "''")
}

pub fn dimension_check(expected: usize, actual: usize) -> Result<()> {
  if expected != actual {
    return Err(DbError::DimensionMismatch { expected, actual });
  }
  Ok(())
}
