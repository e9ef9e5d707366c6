//! Fixed-size overlapping text chunker.
//!
//! Splits document text into [`Passage`]s of at most `chunk_size`
//! characters, with consecutive passages sharing up to `chunk_overlap`
//! characters of trailing context.
//!
//! # Algorithm
//!
//! 1. Split the text on `separator` (empty pieces are dropped).
//! 2. Accumulate pieces into a window, joined by `separator`, until adding
//!    the next piece would exceed `chunk_size`.
//! 3. Emit the window (trimmed) as a passage, then drop pieces from the
//!    front until the window holds at most `chunk_overlap` characters and
//!    the next piece fits.
//! 4. A single piece longer than `chunk_size` is emitted on its own; it is
//!    never hard-split.
//!
//! Lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::{chunk_document, ChunkParams};
//!
//! let params = ChunkParams { chunk_size: 12, chunk_overlap: 6, separator: "\n".into() };
//! let passages = chunk_document(Some("a.txt"), "alpha\nbeta\ngamma\ndelta", &params);
//! let texts: Vec<&str> = passages.iter().map(|p| p.content.as_str()).collect();
//! assert_eq!(texts, ["alpha\nbeta", "beta\ngamma", "gamma\ndelta"]);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Passage;

/// Chunker settings.
#[derive(Debug, Clone)]
pub struct ChunkParams {
    /// Maximum passage length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next passage.
    pub chunk_overlap: usize,
    /// Boundary the text is split on before merging.
    pub separator: String,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n".to_string(),
        }
    }
}

/// Split a document into overlapping passages.
///
/// Returns passages with contiguous `chunk_index` values starting at 0.
/// Whitespace-only text yields no passages.
pub fn chunk_document(source_id: Option<&str>, text: &str, params: &ChunkParams) -> Vec<Passage> {
    split_text(text, params)
        .into_iter()
        .enumerate()
        .map(|(index, content)| make_passage(source_id, index, content))
        .collect()
}

/// Split text into overlapping windows without wrapping them as passages.
pub fn split_text(text: &str, params: &ChunkParams) -> Vec<String> {
    let pieces: Vec<&str> = if params.separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(params.separator.as_str())
            .filter(|piece| !piece.is_empty())
            .collect()
    };
    merge_pieces(&pieces, params)
}

fn merge_pieces(pieces: &[&str], params: &ChunkParams) -> Vec<String> {
    let sep = params.separator.as_str();
    let sep_len = sep.chars().count();

    let mut out = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = piece.chars().count();
        let joiner = |window: &VecDeque<(&str, usize)>| if window.is_empty() { 0 } else { sep_len };

        if total + len + joiner(&window) > params.chunk_size && !window.is_empty() {
            push_joined(&mut out, &window, sep);

            while total > params.chunk_overlap
                || (total + len + joiner(&window) > params.chunk_size && total > 0)
            {
                let Some((_, front_len)) = window.pop_front() else {
                    break;
                };
                total -= front_len + if window.is_empty() { 0 } else { sep_len };
            }
        }

        window.push_back((piece, len));
        total += len + if window.len() > 1 { sep_len } else { 0 };
    }

    push_joined(&mut out, &window, sep);
    out
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>, sep: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Create a [`Passage`] with a fresh UUID and a SHA-256 content hash.
pub fn make_passage(source_id: Option<&str>, index: usize, content: String) -> Passage {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Passage {
        id: Uuid::new_v4().to_string(),
        content,
        source_id: source_id.map(str::to_string),
        chunk_index: index,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams {
            chunk_size: size,
            chunk_overlap: overlap,
            separator: "\n".to_string(),
        }
    }

    #[test]
    fn test_short_text_is_one_passage() {
        let passages = chunk_document(Some("doc.txt"), "Hello, world!", &ChunkParams::default());
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].content, "Hello, world!");
        assert_eq!(passages[0].source_id.as_deref(), Some("doc.txt"));
        assert_eq!(passages[0].chunk_index, 0);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(chunk_document(None, "", &ChunkParams::default()).is_empty());
        assert!(chunk_document(None, "\n\n  \n", &ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let chunks = split_text("aaaa\nbbbb\ncccc\ndddd", &params(9, 4));
        assert_eq!(chunks, ["aaaa\nbbbb", "bbbb\ncccc", "cccc\ndddd"]);
    }

    #[test]
    fn test_zero_overlap_drops_whole_window() {
        let chunks = split_text("aaaa\nbbbb\ncccc\ndddd", &params(9, 0));
        assert_eq!(chunks, ["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn test_oversized_piece_is_kept_whole() {
        let long = "x".repeat(30);
        let text = format!("ab\n{long}\ncd");
        let chunks = split_text(&text, &params(10, 2));
        assert_eq!(chunks, vec!["ab".to_string(), long, "cd".to_string()]);
    }

    #[test]
    fn test_lengths_count_characters() {
        // Four 3-byte characters per line: 4 chars each, 12 bytes each.
        let chunks = split_text("ééé€\n€€€€", &params(9, 0));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_indices_contiguous_and_hashes_stable() {
        let text = (0..40)
            .map(|i| format!("Line number {i} of the corpus."))
            .collect::<Vec<_>>()
            .join("\n");
        let a = chunk_document(None, &text, &params(120, 30));
        let b = chunk_document(None, &text, &params(120, 30));
        assert!(a.len() > 1);
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert_eq!(x.chunk_index, i);
            assert_eq!(x.hash, y.hash);
            assert_ne!(x.id, y.id);
            assert!(x.content.chars().count() <= 120);
        }
    }

    #[test]
    fn test_empty_separator_splits_characters() {
        let p = ChunkParams {
            chunk_size: 3,
            chunk_overlap: 1,
            separator: String::new(),
        };
        assert_eq!(split_text("abcde", &p), ["abc", "cde"]);
    }
}
