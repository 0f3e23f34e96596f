#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("unsupported language: {0:?}")]
  UnsupportedLanguage(sift_core::Language),
  #[error("failed to compile tree-sitter query: {0}")]
  QueryCompile(#[from] tree_sitter::QueryError),
}
