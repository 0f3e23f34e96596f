//! File splitting for the Parse stage (spec §4.h).
//!
//! Three window strategies keyed by extension: fixed-line windows for code,
//! heading-aware windows for markdown, and fixed-token windows for
//! everything else (config and plain text). No tree-sitter, no AST —
//! splitting is deliberately boundary-naive; `ChunkEnrich` is where meaning
//! gets attached to a chunk, not here.

use sift_core::{Chunk, ChunkType};

/// `.py` window size, in lines.
const CODE_WINDOW_LINES: usize = 40;
/// `.py` window overlap, in lines.
const CODE_OVERLAP_LINES: usize = 15;
/// Hard cap on a single code chunk's content length; a window that grows
/// past this (very long lines) is truncated rather than grown further.
const CODE_MAX_CHARS: usize = 1500;

/// Prose/config window size, in tokens (approximated via `CHARS_PER_TOKEN`).
const PROSE_WINDOW_TOKENS: usize = 512;
/// Prose/config window overlap, in tokens.
const PROSE_OVERLAP_TOKENS: usize = 50;

/// First N bytes inspected for a NUL byte when deciding if a file is binary.
const BINARY_SNIFF_BYTES: usize = 8192;

/// Extensions routed through the code splitter. The spec names `.py`
/// explicitly; other common source extensions get the same treatment since
/// the splitter itself has no language-specific behavior beyond line
/// counting.
fn is_code_extension(ext: &str) -> bool {
  matches!(
    ext.to_lowercase().as_str(),
    "py" | "pyi"
      | "rs"
      | "go"
      | "js"
      | "mjs"
      | "cjs"
      | "ts"
      | "tsx"
      | "jsx"
      | "java"
      | "kt"
      | "kts"
      | "cs"
      | "cpp"
      | "cc"
      | "cxx"
      | "hpp"
      | "hxx"
      | "c"
      | "h"
      | "rb"
      | "php"
      | "sh"
      | "bash"
  )
}

fn is_markdown_extension(ext: &str) -> bool {
  matches!(ext.to_lowercase().as_str(), "md" | "markdown")
}

/// Whether `content` looks binary: a NUL byte within the first 8KB, or bytes
/// that don't round-trip as UTF-8. Binary files are skipped by the Parse
/// stage entirely (no chunks produced).
pub fn looks_binary(bytes: &[u8]) -> bool {
  let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
  sniff.contains(&0) || std::str::from_utf8(sniff).is_err()
}

/// Splits `content` (already-decoded text) from `file_path` into chunks,
/// selecting a strategy by the file's extension. Empty or whitespace-only
/// windows are dropped. Each chunk's `metadata["extension"]` records the
/// source extension for downstream filtering.
pub fn split_file(file_path: &str, content: &str) -> Vec<Chunk> {
  let ext = extension_of(file_path);

  let mut chunks = if is_code_extension(&ext) {
    split_code(content, ChunkType::Code)
  } else if is_markdown_extension(&ext) {
    split_markdown(content)
  } else {
    split_prose(content, ChunkType::Config)
  };

  for (index, chunk) in chunks.iter_mut().enumerate() {
    chunk.chunk_index = index;
    chunk.id = sift_core::compute_chunk_id(file_path, index);
    chunk.file_path = file_path.to_string();
    chunk.metadata.insert("extension".to_string(), serde_json::Value::String(ext.clone()));
  }

  chunks
}

fn extension_of(file_path: &str) -> String {
  std::path::Path::new(file_path).extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase()
}

/// Fixed `CODE_WINDOW_LINES`-line windows overlapping by `CODE_OVERLAP_LINES`
/// lines, each additionally capped at `CODE_MAX_CHARS` characters.
fn split_code(content: &str, chunk_type: ChunkType) -> Vec<Chunk> {
  let lines: Vec<&str> = content.lines().collect();
  if lines.is_empty() {
    return Vec::new();
  }

  let stride = CODE_WINDOW_LINES - CODE_OVERLAP_LINES;
  let mut chunks = Vec::new();
  let mut start = 0usize;

  loop {
    let end = (start + CODE_WINDOW_LINES).min(lines.len());
    let window = &lines[start..end];
    let text = truncate_chars(&window.join("\n"), CODE_MAX_CHARS);

    if !text.trim().is_empty() {
      let mut chunk = Chunk::new("", 0, text, chunk_type);
      chunk.start_line = (start + 1) as u32;
      chunk.end_line = end as u32;
      chunks.push(chunk);
    }

    if end >= lines.len() {
      break;
    }
    start += stride;
  }

  chunks
}

/// Splits on top-level markdown headings (`#`..`######`); text before the
/// first heading becomes its own leading chunk. A heading section that is
/// itself oversized is further split by the prose windower so no single
/// chunk grows unbounded.
fn split_markdown(content: &str) -> Vec<Chunk> {
  let lines: Vec<&str> = content.lines().collect();
  let mut sections: Vec<(usize, usize)> = Vec::new();
  let mut section_start = 0usize;

  for (i, line) in lines.iter().enumerate() {
    if i > section_start && is_markdown_heading(line) {
      sections.push((section_start, i));
      section_start = i;
    }
  }
  sections.push((section_start, lines.len()));

  let mut chunks = Vec::new();
  for (start, end) in sections {
    let text = lines[start..end].join("\n");
    if text.trim().is_empty() {
      continue;
    }
    if text.chars().count() <= PROSE_WINDOW_TOKENS * sift_core::CHARS_PER_TOKEN {
      let mut chunk = Chunk::new("", 0, text, ChunkType::Doc);
      chunk.start_line = (start + 1) as u32;
      chunk.end_line = end as u32;
      chunks.push(chunk);
    } else {
      let mut sub = split_prose(&text, ChunkType::Doc);
      for c in &mut sub {
        c.start_line += start as u32;
        c.end_line += start as u32;
      }
      chunks.extend(sub);
    }
  }

  chunks
}

fn is_markdown_heading(line: &str) -> bool {
  let trimmed = line.trim_start();
  trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(|c: char| c == ' ' || c.is_whitespace())
}

/// Fixed token windows (approximated in characters via `CHARS_PER_TOKEN`),
/// overlapping by `PROSE_OVERLAP_TOKENS` tokens. Used for config files and
/// any extension with no dedicated splitter.
fn split_prose(content: &str, chunk_type: ChunkType) -> Vec<Chunk> {
  let window_chars = PROSE_WINDOW_TOKENS * sift_core::CHARS_PER_TOKEN;
  let overlap_chars = PROSE_OVERLAP_TOKENS * sift_core::CHARS_PER_TOKEN;
  let stride = window_chars - overlap_chars;

  let chars: Vec<char> = content.chars().collect();
  if chars.is_empty() {
    return Vec::new();
  }

  let line_offsets = line_offsets(content);
  let mut chunks = Vec::new();
  let mut start = 0usize;

  loop {
    let end = (start + window_chars).min(chars.len());
    let text: String = chars[start..end].iter().collect();

    if !text.trim().is_empty() {
      let mut chunk = Chunk::new("", 0, text, chunk_type);
      chunk.start_line = line_for_char_offset(&line_offsets, start) as u32;
      chunk.end_line = line_for_char_offset(&line_offsets, end.saturating_sub(1).max(start)) as u32;
      chunks.push(chunk);
    }

    if end >= chars.len() {
      break;
    }
    start += stride;
  }

  chunks
}

fn truncate_chars(s: &str, max: usize) -> String {
  if s.chars().count() <= max { s.to_string() } else { s.chars().take(max).collect() }
}

/// Char-offset at which each line (1-indexed) begins, for mapping a prose
/// window's char range back to approximate line numbers.
fn line_offsets(content: &str) -> Vec<usize> {
  let mut offsets = vec![0usize];
  let mut offset = 0usize;
  for ch in content.chars() {
    offset += 1;
    if ch == '\n' {
      offsets.push(offset);
    }
  }
  offsets
}

fn line_for_char_offset(offsets: &[usize], char_offset: usize) -> usize {
  match offsets.binary_search(&char_offset) {
    Ok(i) => i + 1,
    Err(i) => i,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn binary_detection_flags_null_byte() {
    assert!(looks_binary(&[0x00, 0x01, 0x02]));
    assert!(!looks_binary(b"fn main() {}"));
  }

  #[test]
  fn code_splitter_windows_with_overlap() {
    let content = (0..100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
    let chunks = split_code(&content, ChunkType::Code);
    assert!(chunks.len() > 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 40);
    assert_eq!(chunks[1].start_line, 26); // 40 - 15 overlap + 1
  }

  #[test]
  fn code_splitter_drops_empty_windows() {
    let chunks = split_code("\n\n\n", ChunkType::Code);
    assert!(chunks.is_empty());
  }

  #[test]
  fn code_chunk_respects_char_cap() {
    let long_line = "x".repeat(5000);
    let chunks = split_code(&long_line, ChunkType::Code);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content.chars().count(), CODE_MAX_CHARS);
  }

  #[test]
  fn markdown_splits_on_headings() {
    let content = "intro text\n\n# First\nbody one\n\n# Second\nbody two\n";
    let chunks = split_markdown(content);
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].content.contains("intro text"));
    assert!(chunks[1].content.contains("# First"));
    assert!(chunks[2].content.contains("# Second"));
    assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Doc));
  }

  #[test]
  fn prose_splitter_windows_by_token_budget() {
    let content = "word ".repeat(10_000);
    let chunks = split_prose(&content, ChunkType::Config);
    assert!(chunks.len() > 1);
    for c in &chunks {
      assert!(c.content.chars().count() <= PROSE_WINDOW_TOKENS * sift_core::CHARS_PER_TOKEN);
    }
  }

  #[test]
  fn split_file_routes_by_extension_and_stamps_metadata() {
    let py = split_file("a/b.py", "x = 1\n");
    assert_eq!(py[0].chunk_type, ChunkType::Code);
    assert_eq!(py[0].metadata.get("extension").unwrap(), "py");

    let md = split_file("README.md", "# Title\nbody\n");
    assert!(md.iter().all(|c| c.chunk_type == ChunkType::Doc));

    let yaml = split_file("config.yaml", "a: 1\nb: 2\n");
    assert!(yaml.iter().all(|c| c.chunk_type == ChunkType::Config));
  }

  #[test]
  fn split_file_assigns_sequential_deterministic_ids() {
    let chunks = split_file("a.py", &(0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n"));
    for (i, chunk) in chunks.iter().enumerate() {
      assert_eq!(chunk.chunk_index, i);
      assert_eq!(chunk.id, sift_core::compute_chunk_id("a.py", i));
    }
  }

  #[test]
  fn empty_file_produces_no_chunks() {
    assert!(split_file("empty.py", "").is_empty());
    assert!(split_file("empty.md", "").is_empty());
    assert!(split_file("empty.yaml", "").is_empty());
  }
}
