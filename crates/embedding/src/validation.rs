// Input/output validation shared by every provider: text truncated before
// it is sent, vectors checked against the schema-declared width after.

use crate::EmbeddingError;

/// Truncates `text` to at most `max_chars` characters (char boundary safe),
/// returning the original length alongside the possibly-shortened text.
pub fn truncate_input(text: &str, max_chars: usize) -> (String, usize) {
  let char_count = text.chars().count();
  if char_count <= max_chars {
    return (text.to_string(), char_count);
  }
  (text.chars().take(max_chars).collect(), char_count)
}

/// Rejects input outright rather than silently truncating, for callers that
/// would rather fail a chunk than embed a partial representation of it.
pub fn validate_input_size(text: &str, max_chars: usize) -> Result<(), EmbeddingError> {
  let chars = text.chars().count();
  if chars > max_chars {
    return Err(EmbeddingError::InputTooLarge { chars, limit: max_chars });
  }
  Ok(())
}

/// Checks a returned vector against the dimension the provider advertises.
pub fn validate_dimensions(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
  if vector.len() != expected {
    return Err(EmbeddingError::DimensionMismatch { expected, actual: vector.len() });
  }
  Ok(())
}

/// Validates every vector in a batch, preserving the index-to-chunk mapping
/// by erroring on the first mismatch rather than filtering silently.
pub fn validate_batch_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<(), EmbeddingError> {
  for vector in vectors {
    validate_dimensions(vector, expected)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncate_input_leaves_short_text_untouched() {
    let (text, original_len) = truncate_input("hello", 100);
    assert_eq!(text, "hello");
    assert_eq!(original_len, 5);
  }

  #[test]
  fn truncate_input_cuts_at_char_boundary() {
    let long = "a".repeat(20);
    let (text, original_len) = truncate_input(&long, 10);
    assert_eq!(text.chars().count(), 10);
    assert_eq!(original_len, 20);
  }

  #[test]
  fn validate_input_size_rejects_oversized_text() {
    let err = validate_input_size(&"x".repeat(10), 5).unwrap_err();
    assert!(matches!(err, EmbeddingError::InputTooLarge { chars: 10, limit: 5 }));
  }

  #[test]
  fn validate_dimensions_flags_mismatch() {
    let err = validate_dimensions(&[0.0; 3], 4).unwrap_err();
    assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 4, actual: 3 }));
  }

  #[test]
  fn validate_batch_dimensions_stops_at_first_bad_vector() {
    let vectors = vec![vec![0.0; 4], vec![0.0; 3]];
    let err = validate_batch_dimensions(&vectors, 4).unwrap_err();
    assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 4, actual: 3 }));
  }
}
