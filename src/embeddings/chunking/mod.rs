#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for splitting article text into retrieval chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap in characters between adjacent chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Split text into overlapping chunks, preferring sentence boundaries.
///
/// Text that fits within `chunk_size` is returned as a single chunk,
/// untouched. Longer text is scanned forward: each chunk ends at the
/// nearest period or newline found in its second half, falling back to
/// the raw size boundary when none exists. Adjacent chunks overlap by
/// `overlap` characters so that sentences cut near a boundary remain
/// retrievable from both sides.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be positive");

    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    // Config validation rejects overlap >= chunk_size; clamp anyway so
    // the cursor always moves forward.
    let overlap = overlap.min(chunk_size - 1);

    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(text.len()));

        if end < text.len() {
            // Prefer cutting at the last sentence terminator inside the
            // chunk, but only past the halfway point so chunks are not
            // shrunk too aggressively.
            let terminator = bytes
                .get(start..end)
                .and_then(|window| window.iter().rposition(|&b| b == b'.' || b == b'\n'));
            if let Some(pos) = terminator {
                if pos > (end - start) / 2 {
                    end = start + pos + 1;
                }
            }
        }

        if let Some(piece) = text.get(start..end) {
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
        }

        if end >= text.len() {
            break;
        }

        // Never let the cursor stall, even with an oversized overlap.
        let next_start = floor_char_boundary(text, end.saturating_sub(overlap));
        start = if next_start > start { next_start } else { end };
    }

    debug!(
        "Chunked {} chars into {} chunks (size {}, overlap {})",
        text.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

/// Round a byte index down to the nearest char boundary
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
