//! Prompt construction and response parsing for chunk summarization.

const CONTENT_PREVIEW_CHARS: usize = 1000;

/// Template for the per-chunk summarize/purpose request. `file_path` and
/// `chunk_type` orient the model; content is truncated so prompt size stays
/// bounded regardless of chunk length.
pub fn build_chunk_enrich_prompt(file_path: &str, chunk_type: &str, content: &str) -> String {
  let preview: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
  format!(
    "You are summarizing one chunk of source code for a codebase index.\n\n\
File: {file_path}\n\
Type: {chunk_type}\n\n\
Content:\n{preview}\n\n\
Respond with exactly two labeled lines:\n\
Summary: <one to two sentences describing what this chunk does>\n\
Purpose: <one sentence describing why it exists>"
  )
}

/// Extracts the `Summary:`/`Purpose:` lines from a chat response. Tolerant
/// of extra surrounding text, different line order, and missing labels —
/// a missing label yields `None` rather than failing the whole parse.
pub fn parse_summary_purpose(text: &str) -> (Option<String>, Option<String>) {
  let mut summary = None;
  let mut purpose = None;

  for line in text.lines() {
    let trimmed = line.trim();
    if let Some(rest) = strip_label(trimmed, "summary:") {
      if summary.is_none() && !rest.is_empty() {
        summary = Some(rest.to_string());
      }
    } else if let Some(rest) = strip_label(trimmed, "purpose:") {
      if purpose.is_none() && !rest.is_empty() {
        purpose = Some(rest.to_string());
      }
    }
  }

  (summary, purpose)
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
  let lower = line.to_lowercase();
  if lower.starts_with(label) { Some(line[label.len()..].trim()) } else { None }
}
