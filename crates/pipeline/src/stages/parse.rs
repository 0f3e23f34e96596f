//! Parse stage (spec §4.h).
//!
//! Reads a file's bytes, decodes them through an encoding fallback chain,
//! skips binary content, and splits the rest into chunks via
//! `index::split_file`. Delete events pass through untouched; there is
//! nothing to read for a file that no longer exists. A context that
//! already carries an error (e.g. an oversized file caught upstream) is
//! left alone too — there is nothing to gain from reading a file the
//! pipeline has already decided not to index.

use sift_core::{Chunk, PipelineFileContext, compute_content_hash};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::queue::{QueueItem, QueueSender, SharedReceiver};

/// Bytes sniffed from the start of a file to decide binary vs. text,
/// mirroring `index::chunker`'s own sniff window.
const SNIFF_BYTES: usize = 8192;

pub async fn run_worker(
  worker_id: usize,
  rx: SharedReceiver<PipelineFileContext>,
  tx: QueueSender<PipelineFileContext>,
  done_tx: mpsc::Sender<()>,
  cancel: CancellationToken,
) {
  loop {
    let msg = {
      let mut guard = rx.lock().await;
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        msg = guard.recv() => msg,
      }
    };

    match msg {
      Some(QueueItem::Item(mut ctx)) => {
        if !ctx.is_delete() && !ctx.has_errors() {
          parse_one(&mut ctx).await;
        }
        if tx.put(ctx).await.is_err() {
          break;
        }
      }
      Some(QueueItem::Shutdown) | None => break,
    }
  }

  trace!(worker_id, "parse worker finished");
  let _ = done_tx.send(()).await;
}

async fn parse_one(ctx: &mut PipelineFileContext) {
  let bytes = match tokio::fs::read(&ctx.abs_path).await {
    Ok(bytes) => bytes,
    Err(err) => {
      ctx.push_error(format!("read failed: {err}"));
      return;
    }
  };

  let sniff_len = bytes.len().min(SNIFF_BYTES);
  if index::looks_binary(&bytes[..sniff_len]) {
    debug!(file_path = %ctx.file_path, "parse: binary content, skipping split");
    ctx.mark_skipped();
    return;
  }

  let (content, encoding) = decode_with_fallback(&bytes);
  if encoding != "utf-8" {
    debug!(file_path = %ctx.file_path, encoding, "parse: used a fallback encoding");
  }

  ctx.checksum = Some(compute_content_hash(&content));
  let chunks: Vec<Chunk> = index::split_file(&ctx.file_path, &content);
  ctx.chunks = chunks;
  ctx.mark_success();
}

/// UTF-8 → UTF-8-BOM → Latin-1 → CP-1252 → ISO-8859-1 → UTF-8 w/ replacement.
/// The last two steps are both total functions (every byte sequence
/// decodes), so in practice one of them always terminates the chain; the
/// ordering still matters for which *interpretation* of a non-UTF-8 file
/// wins.
fn decode_with_fallback(bytes: &[u8]) -> (String, &'static str) {
  if let Ok(s) = std::str::from_utf8(bytes) {
    return (s.to_string(), "utf-8");
  }

  if let Some(stripped) = bytes.strip_prefix(b"\xef\xbb\xbf") {
    if let Ok(s) = std::str::from_utf8(stripped) {
      return (s.to_string(), "utf-8-bom");
    }
  }

  if let Some(s) = decode_latin1_if_plausible(bytes) {
    return (s, "latin-1");
  }

  let (cow, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
  if !had_errors {
    return (cow.into_owned(), "cp1252");
  }

  (bytes.iter().map(|&b| b as char).collect(), "iso-8859-1")
}

/// Raw byte-to-codepoint Latin-1 decoding never fails, but bytes in the
/// 0x80-0x9F range are undefined control codes under true Latin-1 while
/// being meaningful printable characters (curly quotes, dashes) under
/// CP-1252 — so treat their presence as "not actually Latin-1".
fn decode_latin1_if_plausible(bytes: &[u8]) -> Option<String> {
  if bytes.iter().any(|&b| (0x80..=0x9F).contains(&b)) {
    return None;
  }
  Some(bytes.iter().map(|&b| b as char).collect())
}
