use crate::error::RagError;

/// A contiguous run of the extracted text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of this chunk in document order, starting at 0.
    pub ordinal: usize,
    /// Character offset of the chunk's first character in the source text.
    pub offset: usize,
    pub text: String,
}

/// How far back from the hard cut a chunk end may be pulled to land on
/// a sentence or word boundary, as a fraction of `max_size`.
const BOUNDARY_TOLERANCE_DIVISOR: usize = 5;

/// Splits `text` into overlapping chunks of at most `max_size` characters.
///
/// Each non-first chunk starts exactly `overlap` characters before the
/// end of its predecessor. Stripping the first `overlap` characters of
/// every chunk after the first and concatenating reconstructs `text`
/// exactly; nothing is lost or duplicated beyond the declared overlap.
///
/// Where a chunk would be cut mid-word, the end is pulled back (within a
/// small tolerance window) to land just after sentence punctuation, or
/// failing that after whitespace. The final chunk may be shorter than
/// `max_size`.
///
/// Empty input yields an empty sequence; the caller decides whether that
/// is an error. Invalid parameters fail with `RagError::Configuration`.
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    if max_size == 0 {
        return Err(RagError::Configuration(
            "chunk_size must be greater than 0".to_string(),
        ));
    }
    if overlap >= max_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({overlap}) must be smaller than chunk_size ({max_size})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0usize;

    loop {
        let hard_end = (start + max_size).min(chars.len());
        let end = if hard_end < chars.len() {
            snap_end(&chars, start + overlap + 1, hard_end, max_size)
        } else {
            hard_end
        };

        chunks.push(Chunk {
            ordinal,
            offset: start,
            text: chars[start..end].iter().collect(),
        });
        ordinal += 1;

        if end >= chars.len() {
            break;
        }
        // Next chunk re-covers the last `overlap` characters.
        start = end - overlap;
    }

    Ok(chunks)
}

/// Picks the cut position for a chunk ending at `hard_end` at the
/// latest. Scans backward through the tolerance window for a position
/// just past sentence punctuation, then for one just past whitespace;
/// falls back to the hard character cut. Never returns less than
/// `floor`, which guarantees forward progress past the overlap region.
fn snap_end(chars: &[char], floor: usize, hard_end: usize, max_size: usize) -> usize {
    let tolerance = max_size / BOUNDARY_TOLERANCE_DIVISOR;
    let lo = hard_end.saturating_sub(tolerance).max(floor);
    if lo >= hard_end {
        return hard_end;
    }

    // Prefer ending right after a sentence terminator.
    for end in (lo..=hard_end).rev() {
        if is_sentence_end(chars[end - 1]) {
            return end;
        }
    }

    // Otherwise avoid splitting mid-word: end right after whitespace.
    for end in (lo..=hard_end).rev() {
        if chars[end - 1].is_whitespace() {
            return end;
        }
    }

    hard_end
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}
