//! Fixed-window text chunker with overlap.
//!
//! Splits a document into [`Chunk`]s of at most `max_tokens` (approximated
//! as characters) with `overlap_tokens` of shared context between
//! neighbours. Window ends are pulled back to the last whitespace so words
//! are not cut, and every cut is snapped to a UTF-8 char boundary.
//!
//! Each chunk gets a UUIDv5 derived from the document source and the chunk
//! index, plus a SHA-256 hash of its text. Both are pure functions of the
//! input, so re-chunking an unchanged document yields identical chunks and
//! re-insertion overwrites rather than duplicates.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` / `overlap_tokens` to characters (× 4).
//! 2. Take a window `[start, start + max_chars)`; if it does not reach the
//!    end of the text, shorten it to the last whitespace inside it.
//! 3. Emit the trimmed window as a chunk.
//! 4. Step back `overlap_chars` from the window end, move forward to the
//!    next word start, and continue from there (always making progress).
//!
//! # Example
//!
//! ```rust
//! use ragpipe_core::chunk::{chunk_text, ChunkPolicy};
//!
//! let policy = ChunkPolicy { max_tokens: 200, overlap_tokens: 40 };
//! let chunks = chunk_text("notes/a.md", "Hello world.", &policy);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Window size and overlap, in approximate tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            overlap_tokens: 40,
        }
    }
}

/// Split text into overlapping windows.
///
/// # Guarantees
///
/// - Blank text yields no chunks.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - No chunk is longer than `max_tokens × 4` bytes, except a single
///   unbreakable character sequence that itself exceeds the window, which
///   is hard-cut at a char boundary.
/// - The output is a pure function of `(source, text, policy)`.
pub fn chunk_text(source: &str, text: &str, policy: &ChunkPolicy) -> Vec<Chunk> {
    let max_chars = policy.max_tokens.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = (policy.overlap_tokens * CHARS_PER_TOKEN).min(max_chars - 1);

    let text = text.trim();
    let mut chunks = Vec::new();
    if text.is_empty() {
        return chunks;
    }

    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let mut end = snap_to_char_boundary(text, start + max_chars);
        if end < text.len() {
            if let Some(pos) = text[start..end].rfind(char::is_whitespace) {
                if pos > 0 {
                    end = start + pos;
                }
            }
        }
        if end <= start {
            end = next_char_boundary(text, start);
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(source, chunk_index, piece));
            chunk_index += 1;
        }

        if end >= text.len() {
            break;
        }

        let mut next = snap_to_char_boundary(text, end.saturating_sub(overlap_chars));
        if next > start && next < end && !text[..next].ends_with(char::is_whitespace) {
            // Landed mid-word: skip to the next word start.
            next = match text[next..end].find(char::is_whitespace) {
                Some(pos) => next + pos,
                None => end,
            };
        }
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

/// Deterministic chunk id for a `(source, chunk_index)` pair.
pub fn chunk_id(source: &str, chunk_index: i64) -> String {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"ragpipe.chunk");
    Uuid::new_v5(&namespace, format!("{}#{}", source, chunk_index).as_bytes()).to_string()
}

/// SHA-256 hex digest of chunk text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Byte index just past the char that starts at `index`.
fn next_char_boundary(s: &str, index: usize) -> usize {
    s[index..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| index + i)
        .unwrap_or(s.len())
}

fn make_chunk(source: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        id: chunk_id(source, index),
        text: text.to_string(),
        source: source.to_string(),
        chunk_index: index,
        content_hash: content_hash(text),
    }
}
