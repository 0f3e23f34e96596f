use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for the `chunks` table, per the storage schema reference: `id`
/// primary key, `file_path` indexed for prefix/equality lookups, `vector`
/// nullable (a chunk may not be embedded yet, or embedding may have failed).
pub fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("file_path", DataType::Utf8, false),
    Field::new("chunk_index", DataType::UInt32, false),
    Field::new("content", DataType::Utf8, false),
    Field::new("start_line", DataType::UInt32, false),
    Field::new("end_line", DataType::UInt32, false),
    Field::new("chunk_type", DataType::Utf8, false),
    Field::new("summary", DataType::Utf8, true),
    Field::new("purpose", DataType::Utf8, true),
    Field::new("metadata", DataType::Utf8, false), // JSON object
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      true,
    ),
  ]))
}

/// Schema for the `file_summaries` table. `mtime`/`checksum` are lifted out
/// of `metadata` into their own indexed columns so the IncrementalFilter can
/// query them without parsing JSON per row; `metadata` still carries the
/// full struct (including `size`/`valid`/`invalid_reason`) for fidelity.
pub fn file_summaries_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("file_path", DataType::Utf8, false),
    Field::new("summary", DataType::Utf8, false),
    Field::new("mtime", DataType::Float64, false),
    Field::new("checksum", DataType::Utf8, false),
    Field::new("metadata", DataType::Utf8, false), // JSON object
  ]))
}
