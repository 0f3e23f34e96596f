use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse content category for a chunk, distinct from the finer-grained
/// AST definition kind a splitter may additionally record in `metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
  Code,
  Doc,
  Config,
  Text,
}

impl ChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChunkType::Code => "code",
      ChunkType::Doc => "doc",
      ChunkType::Config => "config",
      ChunkType::Text => "text",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "code" => Some(ChunkType::Code),
      "doc" => Some(ChunkType::Doc),
      "config" => Some(ChunkType::Config),
      "text" => Some(ChunkType::Text),
      _ => None,
    }
  }
}

/// Source language, used to pick a splitter and to enrich embedding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  TypeScript,
  JavaScript,
  Tsx,
  Jsx,
  Html,
  Css,
  Rust,
  Python,
  Go,
  Java,
  Kotlin,
  CSharp,
  Cpp,
  C,
  Ruby,
  Php,
  Bash,
  Json,
  Yaml,
  Toml,
  Markdown,
  PlainText,
}

impl Language {
  pub fn from_extension(ext: &str) -> Self {
    match ext.to_lowercase().as_str() {
      "ts" | "mts" => Language::TypeScript,
      "js" | "mjs" | "cjs" => Language::JavaScript,
      "tsx" => Language::Tsx,
      "jsx" => Language::Jsx,
      "html" | "htm" => Language::Html,
      "css" => Language::Css,
      "rs" => Language::Rust,
      "py" | "pyi" | "pyw" => Language::Python,
      "go" => Language::Go,
      "java" => Language::Java,
      "kt" | "kts" => Language::Kotlin,
      "cs" => Language::CSharp,
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Language::Cpp,
      "c" | "h" => Language::C,
      "rb" | "rake" => Language::Ruby,
      "php" => Language::Php,
      "sh" | "bash" | "zsh" => Language::Bash,
      "json" | "jsonc" => Language::Json,
      "yaml" | "yml" => Language::Yaml,
      "toml" => Language::Toml,
      "md" | "markdown" => Language::Markdown,
      _ => Language::PlainText,
    }
  }

  /// Whether the `parser` crate's tree-sitter grammars cover this language.
  pub fn is_code_aware(&self) -> bool {
    !matches!(self, Language::Json | Language::Yaml | Language::Toml | Language::Markdown | Language::PlainText)
  }
}

/// Estimated characters per LLM token, used where a real tokenizer would be
/// overkill (prose window sizing, embedding-input truncation accounting).
pub const CHARS_PER_TOKEN: usize = 4;

/// `hash(file_path || "::" || chunk_index)[0:16]`, hex-truncated SHA-256.
///
/// Stable across reindexing runs as long as a file's split boundaries don't
/// change, per the chunk-id invariant.
pub fn compute_chunk_id(file_path: &str, chunk_index: usize) -> String {
  let mut hasher = Sha256::new();
  hasher.update(file_path.as_bytes());
  hasher.update(b"::");
  hasher.update(chunk_index.to_string().as_bytes());
  let digest = hasher.finalize();
  hex::encode(&digest[..8])
}

/// SHA-256 hex digest of file content, used by the IncrementalFilter and the
/// parser as a cheap change-detector separate from the FileSummary checksum
/// (which the spec fixes as MD5).
pub fn compute_content_hash(content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(content.as_bytes());
  hex::encode(hasher.finalize())
}

/// An indexable unit derived from one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub id: String,
  pub file_path: String,
  /// Position within the originating file's ordered chunk sequence; the
  /// `id` is a pure function of `(file_path, chunk_index)`.
  pub chunk_index: usize,
  pub content: String,
  pub start_line: u32,
  pub end_line: u32,
  pub chunk_type: ChunkType,
  pub summary: Option<String>,
  pub purpose: Option<String>,
  pub embedding: Option<Vec<f32>>,
  #[serde(default)]
  pub metadata: BTreeMap<String, Value>,
}

impl Chunk {
  pub fn new(file_path: impl Into<String>, chunk_index: usize, content: String, chunk_type: ChunkType) -> Self {
    let file_path = file_path.into();
    let id = compute_chunk_id(&file_path, chunk_index);
    Self {
      id,
      file_path,
      chunk_index,
      content,
      start_line: 0,
      end_line: 0,
      chunk_type,
      summary: None,
      purpose: None,
      embedding: None,
      metadata: BTreeMap::new(),
    }
  }

  /// Text used as embedding input per the Embed stage: the summary when
  /// present, otherwise the first 1000 chars of raw content.
  pub fn embedding_input(&self) -> String {
    match &self.summary {
      Some(s) if !s.is_empty() => s.clone(),
      _ => self.content.chars().take(1000).collect(),
    }
  }

  pub fn is_empty_content(&self) -> bool {
    self.content.trim().is_empty()
  }
}
