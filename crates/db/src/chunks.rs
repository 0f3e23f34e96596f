use std::collections::BTreeMap;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use sift_core::{Chunk, ChunkType};
use tracing::{debug, trace};

use crate::connection::{escape_sql_literal, Storage};
use crate::error::{DbError, Result};
use crate::schema::chunks_schema;

impl Storage {
  /// Replaces every chunk stored for `file_path` with `chunks`, per the
  /// Persist stage's delete-then-insert contract. Passing an empty slice
  /// deletes without reinserting — the branch used for delete events and
  /// for files that ended up producing no chunks.
  pub async fn save_chunks(&self, file_path: &str, chunks: &[Chunk]) -> Result<()> {
    self.delete_chunks_for_file(file_path).await?;
    if chunks.is_empty() {
      return Ok(());
    }

    trace!(file_path, count = chunks.len(), "saving chunks");
    let table = self.chunks_table().await?;
    let batch = chunks_to_batch(chunks, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], chunks_schema(self.vector_dim));
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn delete_chunks_for_file(&self, file_path: &str) -> Result<()> {
    debug!(file_path, "deleting chunks for file");
    let table = self.chunks_table().await?;
    table
      .delete(&format!("file_path = '{}'", escape_sql_literal(file_path)))
      .await?;
    Ok(())
  }

  pub async fn delete_chunks_for_files(&self, file_paths: &[&str]) -> Result<()> {
    if file_paths.is_empty() {
      return Ok(());
    }
    let list = file_paths
      .iter()
      .map(|p| format!("'{}'", escape_sql_literal(p)))
      .collect::<Vec<_>>()
      .join(", ");
    let table = self.chunks_table().await?;
    table.delete(&format!("file_path IN ({})", list)).await?;
    Ok(())
  }

  pub async fn get_chunks_for_file(&self, file_path: &str) -> Result<Vec<Chunk>> {
    let table = self.chunks_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_path = '{}'", escape_sql_literal(file_path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut chunks = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        chunks.push(batch_to_chunk(batch, row, self.vector_dim)?);
      }
    }
    chunks.sort_by_key(|c| c.chunk_index);
    Ok(chunks)
  }

  pub async fn count_chunks(&self, filter: Option<&str>) -> Result<usize> {
    let table = self.chunks_table().await?;
    Ok(table.count_rows(filter.map(|s| s.to_string())).await?)
  }
}

fn chunks_to_batch(chunks: &[Chunk], vector_dim: usize) -> Result<RecordBatch> {
  let id = StringArray::from(chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>());
  let file_path = StringArray::from(chunks.iter().map(|c| c.file_path.clone()).collect::<Vec<_>>());
  let chunk_index = UInt32Array::from(chunks.iter().map(|c| c.chunk_index as u32).collect::<Vec<_>>());
  let content = StringArray::from(chunks.iter().map(|c| c.content.clone()).collect::<Vec<_>>());
  let start_line = UInt32Array::from(chunks.iter().map(|c| c.start_line).collect::<Vec<_>>());
  let end_line = UInt32Array::from(chunks.iter().map(|c| c.end_line).collect::<Vec<_>>());
  let chunk_type = StringArray::from(
    chunks
      .iter()
      .map(|c| c.chunk_type.as_str().to_string())
      .collect::<Vec<_>>(),
  );
  let summary = StringArray::from(chunks.iter().map(|c| c.summary.clone()).collect::<Vec<_>>());
  let purpose = StringArray::from(chunks.iter().map(|c| c.purpose.clone()).collect::<Vec<_>>());
  let metadata = chunks
    .iter()
    .map(|c| serde_json::to_string(&c.metadata))
    .collect::<std::result::Result<Vec<_>, _>>()?;
  let metadata = StringArray::from(metadata);

  let mut flat = Vec::with_capacity(chunks.len() * vector_dim);
  let mut validity = Vec::with_capacity(chunks.len());
  for c in chunks {
    match &c.embedding {
      Some(v) => {
        let mut padded = v.clone();
        padded.resize(vector_dim, 0.0);
        flat.extend(padded);
        validity.push(true);
      }
      None => {
        flat.extend(std::iter::repeat(0.0f32).take(vector_dim));
        validity.push(false);
      }
    }
  }
  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(Float32Array::from(flat)), Some(validity.into()))?;

  Ok(RecordBatch::try_new(
    chunks_schema(vector_dim),
    vec![
      Arc::new(id),
      Arc::new(file_path),
      Arc::new(chunk_index),
      Arc::new(content),
      Arc::new(start_line),
      Arc::new(end_line),
      Arc::new(chunk_type),
      Arc::new(summary),
      Arc::new(purpose),
      Arc::new(metadata),
      Arc::new(vector),
    ],
  )?)
}

fn batch_to_chunk(batch: &RecordBatch, row: usize, vector_dim: usize) -> Result<Chunk> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };
  let get_string_opt = |name: &str| -> Option<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
  };
  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };

  let chunk_type_str = get_string("chunk_type")?;
  let chunk_type = ChunkType::parse(&chunk_type_str).ok_or_else(|| DbError::NotFound(format!("unknown chunk_type {chunk_type_str}")))?;
  let metadata_json = get_string("metadata")?;
  let metadata: BTreeMap<String, serde_json::Value> = serde_json::from_str(&metadata_json)?;

  let embedding = batch
    .column_by_name("vector")
    .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
    .and_then(|arr| {
      if arr.is_null(row) {
        return None;
      }
      let values = arr.value(row);
      let floats = values.as_any().downcast_ref::<Float32Array>()?;
      Some((0..vector_dim).map(|i| floats.value(i)).collect::<Vec<f32>>())
    });

  Ok(Chunk {
    id: get_string("id")?,
    file_path: get_string("file_path")?,
    chunk_index: get_u32("chunk_index")? as usize,
    content: get_string("content")?,
    start_line: get_u32("start_line")?,
    end_line: get_u32("end_line")?,
    chunk_type,
    summary: get_string_opt("summary").filter(|s| !s.is_empty()),
    purpose: get_string_opt("purpose").filter(|s| !s.is_empty()),
    embedding,
    metadata,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  async fn open_storage() -> (TempDir, Storage) {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("test.lance"), 4).await.unwrap();
    (dir, storage)
  }

  fn test_chunk(file_path: &str, index: usize) -> Chunk {
    let mut chunk = Chunk::new(file_path, index, "fn main() {}".to_string(), ChunkType::Code);
    chunk.start_line = 1;
    chunk.end_line = 3;
    chunk
  }

  #[tokio::test]
  async fn save_then_get_round_trips_fields() {
    let (_dir, storage) = open_storage().await;
    let mut chunk = test_chunk("a.rs", 0);
    chunk.summary = Some("does things".to_string());
    chunk.embedding = Some(vec![0.1, 0.2, 0.3, 0.4]);

    storage.save_chunks("a.rs", &[chunk.clone()]).await.unwrap();
    let fetched = storage.get_chunks_for_file("a.rs").await.unwrap();

    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, chunk.id);
    assert_eq!(fetched[0].summary, chunk.summary);
    assert_eq!(fetched[0].embedding, chunk.embedding);
  }

  #[tokio::test]
  async fn save_chunks_replaces_previous_set() {
    let (_dir, storage) = open_storage().await;
    storage.save_chunks("a.rs", &[test_chunk("a.rs", 0), test_chunk("a.rs", 1)]).await.unwrap();
    storage.save_chunks("a.rs", &[test_chunk("a.rs", 0)]).await.unwrap();

    let fetched = storage.get_chunks_for_file("a.rs").await.unwrap();
    assert_eq!(fetched.len(), 1);
  }

  #[tokio::test]
  async fn save_chunks_with_empty_slice_only_deletes() {
    let (_dir, storage) = open_storage().await;
    storage.save_chunks("a.rs", &[test_chunk("a.rs", 0)]).await.unwrap();
    storage.save_chunks("a.rs", &[]).await.unwrap();

    let fetched = storage.get_chunks_for_file("a.rs").await.unwrap();
    assert!(fetched.is_empty());
  }

  #[tokio::test]
  async fn unembedded_chunks_round_trip_with_no_vector() {
    let (_dir, storage) = open_storage().await;
    let chunk = test_chunk("a.rs", 0);
    storage.save_chunks("a.rs", &[chunk]).await.unwrap();

    let fetched = storage.get_chunks_for_file("a.rs").await.unwrap();
    assert!(fetched[0].embedding.is_none());
  }
}
