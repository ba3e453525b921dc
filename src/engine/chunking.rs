//! Boundary-aware text chunking.
//!
//! Documents are split into overlapping windows of at most `max_len`
//! characters. When a window would end mid-sentence, the right edge is
//! retracted to the nearest sentence terminator within a bounded look-back so
//! chunks do not split sentences when avoidable. Offsets are byte offsets
//! into the source text and always fall on character boundaries, so chunking
//! is safe for multi-byte input.

use super::types::{Chunk, ChunkingError};

/// Characters treated as sentence terminators when retracting a boundary.
const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

/// How far (in characters) to look back from the window edge for a terminator.
const BOUNDARY_LOOKBACK: usize = 100;

/// Split `text` into overlapping, boundary-respecting chunks.
///
/// `max_len` and `overlap` are measured in characters and must satisfy
/// `0 <= overlap < max_len`. Empty input yields an empty vector. The walk
/// always advances past the previous window start, so chunking terminates
/// even when `overlap` is close to `max_len`.
pub fn chunk_text(text: &str, max_len: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkingError> {
    if max_len == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= max_len {
        return Err(ChunkingError::InvalidOverlap {
            overlap,
            chunk_size: max_len,
        });
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, with the total length appended
    // so `boundaries[i]..boundaries[j]` is always a valid slice.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let char_count = boundaries.len() - 1;
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < char_count {
        let mut end = (start + max_len).min(char_count);

        if end < char_count {
            end = retract_to_boundary(&chars, start, end);
        }

        let start_offset = boundaries[start];
        let end_offset = boundaries[end];
        chunks.push(Chunk {
            sequence_index: chunks.len(),
            text: text[start_offset..end_offset].to_string(),
            start_offset,
            end_offset,
        });

        if end >= char_count {
            break;
        }

        // Advance with overlap, but never fall back to or before the previous
        // start so the walk always makes forward progress.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    Ok(chunks)
}

/// Retract `end` to just past the nearest sentence terminator within the
/// look-back window. Returns `end` unchanged when no terminator is found.
fn retract_to_boundary(chars: &[char], start: usize, end: usize) -> usize {
    let floor = end.saturating_sub(BOUNDARY_LOOKBACK).max(start + 1);
    let mut candidate = end;
    while candidate > floor {
        candidate -= 1;
        if SENTENCE_TERMINATORS.contains(&chars[candidate]) {
            return candidate + 1;
        }
    }
    end
}
