use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{Float64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use sift_core::{FileSummary, FileSummaryMetadata};
use tracing::{debug, trace};

use crate::connection::{escape_sql_literal, Storage};
use crate::error::{DbError, Result};
use crate::schema::file_summaries_schema;

impl Storage {
  /// Delete-then-insert for a single `FileSummary`, per the Persist/
  /// FileSummary stage's no-native-upsert contract.
  pub async fn save_file_summary(&self, summary: &FileSummary) -> Result<()> {
    trace!(file_path = %summary.file_path, "saving file summary");
    self.delete_file_summary(&summary.file_path).await?;

    let table = self.file_summaries_table().await?;
    let batch = file_summary_to_batch(summary)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], file_summaries_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn delete_file_summary(&self, file_path: &str) -> Result<()> {
    debug!(file_path, "deleting file summary");
    let table = self.file_summaries_table().await?;
    table
      .delete(&format!("file_path = '{}'", escape_sql_literal(file_path)))
      .await?;
    Ok(())
  }

  pub async fn get_file_summary(&self, file_path: &str) -> Result<Option<FileSummary>> {
    let table = self.file_summaries_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_path = '{}'", escape_sql_literal(file_path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file_summary(batch, 0)?));
      }
    }
    Ok(None)
  }

  /// Loads every recorded `(file_path, mtime)` pair, used by the
  /// IncrementalFilter to decide which files need reprocessing without a
  /// per-file round trip to storage.
  pub async fn load_known_mtimes(&self) -> Result<HashMap<String, f64>> {
    let table = self.file_summaries_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut mtimes = HashMap::new();
    for batch in &results {
      let paths = batch
        .column_by_name("file_path")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
      let times = batch
        .column_by_name("mtime")
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>());
      if let (Some(paths), Some(times)) = (paths, times) {
        for i in 0..batch.num_rows() {
          mtimes.insert(paths.value(i).to_string(), times.value(i));
        }
      }
    }
    Ok(mtimes)
  }

  pub async fn list_file_summaries(&self) -> Result<Vec<FileSummary>> {
    let table = self.file_summaries_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;
    let mut summaries = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        summaries.push(batch_to_file_summary(batch, row)?);
      }
    }
    Ok(summaries)
  }
}

fn file_summary_to_batch(summary: &FileSummary) -> Result<RecordBatch> {
  let file_path = StringArray::from(vec![summary.file_path.clone()]);
  let text = StringArray::from(vec![summary.summary.clone()]);
  let mtime = Float64Array::from(vec![summary.metadata.mtime]);
  let checksum = StringArray::from(vec![summary.metadata.checksum.clone()]);
  let metadata = StringArray::from(vec![serde_json::to_string(&summary.metadata)?]);

  Ok(RecordBatch::try_new(
    file_summaries_schema(),
    vec![Arc::new(file_path), Arc::new(text), Arc::new(mtime), Arc::new(checksum), Arc::new(metadata)],
  )?)
}

fn batch_to_file_summary(batch: &RecordBatch, row: usize) -> Result<FileSummary> {
  let get_string = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| DbError::NotFound(format!("column {name}")))
  };

  let metadata_json = get_string("metadata")?;
  let metadata: FileSummaryMetadata = serde_json::from_str(&metadata_json)?;

  Ok(FileSummary {
    file_path: get_string("file_path")?,
    summary: get_string("summary")?,
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

  #[tokio::test]
  async fn save_then_get_round_trips() {
    let (_dir, storage) = open_storage().await;
    let summary = FileSummary::new("a.py", "does a thing", FileSummaryMetadata::valid(100.0, "abc", 42));
    storage.save_file_summary(&summary).await.unwrap();

    let fetched = storage.get_file_summary("a.py").await.unwrap().unwrap();
    assert_eq!(fetched.summary, "does a thing");
    assert_eq!(fetched.metadata.checksum, "abc");
    assert!(fetched.metadata.valid);
  }

  #[tokio::test]
  async fn save_replaces_previous_summary_for_same_path() {
    let (_dir, storage) = open_storage().await;
    storage
      .save_file_summary(&FileSummary::new("a.py", "v1", FileSummaryMetadata::valid(1.0, "h1", 1)))
      .await
      .unwrap();
    storage
      .save_file_summary(&FileSummary::new("a.py", "v2", FileSummaryMetadata::valid(2.0, "h2", 2)))
      .await
      .unwrap();

    let all = storage.list_file_summaries().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].summary, "v2");
  }

  #[tokio::test]
  async fn load_known_mtimes_covers_every_recorded_file() {
    let (_dir, storage) = open_storage().await;
    storage
      .save_file_summary(&FileSummary::new("a.py", "", FileSummaryMetadata::valid(111.0, "h1", 1)))
      .await
      .unwrap();
    storage
      .save_file_summary(&FileSummary::new("b.py", "", FileSummaryMetadata::valid(222.0, "h2", 2)))
      .await
      .unwrap();

    let mtimes = storage.load_known_mtimes().await.unwrap();
    assert_eq!(mtimes.get("a.py"), Some(&111.0));
    assert_eq!(mtimes.get("b.py"), Some(&222.0));
  }
}
