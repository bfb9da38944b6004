//! Fixed-window text chunker.
//!
//! Splits raw text into consecutive windows of `size` characters, advancing
//! by `size − overlap` characters per step. There is no word or sentence
//! awareness: pure fixed-width slicing favors simplicity and reproducibility
//! over semantic chunk boundaries.
//!
//! Windows are measured in characters, not bytes — byte slicing would panic
//! mid-codepoint on non-ASCII input.

/// Default window size in characters.
pub const DEFAULT_SIZE: usize = 900;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 150;

/// Split `text` into overlapping fixed-size windows.
///
/// Emission stops once the remaining slice is empty or all-whitespace; a
/// trailing whitespace-only tail is dropped, never emitted as a chunk. The
/// stride is clamped to at least 1 so `overlap >= size` cannot loop forever.
/// Deterministic and side-effect-free.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);
    let chars: Vec<char> = text.chars().collect();

    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        if piece.trim().is_empty() {
            break;
        }
        out.push(piece);
        start += step;
    }
    out
}

/// Deterministic chunk id: `{doc_id}-{index}`.
///
/// Unique within a document, and deliberately colliding across re-ingestion
/// of the same `doc_id` so the store overwrites instead of duplicating.
pub fn chunk_id(doc_id: &str, index: usize) -> String {
    format!("{}-{}", doc_id, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", DEFAULT_SIZE, DEFAULT_OVERLAP);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(chunk_text("", DEFAULT_SIZE, DEFAULT_OVERLAP).is_empty());
    }

    #[test]
    fn whitespace_only_text_no_chunks() {
        assert!(chunk_text("   \n\t  ", DEFAULT_SIZE, DEFAULT_OVERLAP).is_empty());
    }

    #[test]
    fn window_math_matches_contract() {
        // 2000 chars, size 900, overlap 150 => stride 750 => windows at
        // offsets 0, 750, 1500 with lengths 900, 900, 500.
        let text = "a".repeat(2000);
        let chunks = chunk_text(&text, 900, 150);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 900);
        assert_eq!(chunks[1].len(), 900);
        assert_eq!(chunks[2].len(), 500);
    }

    #[test]
    fn consecutive_windows_overlap_exactly() {
        let text: String = ('a'..='z').cycle().take(2000).collect();
        let chunks = chunk_text(&text, 900, 150);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(900 - 150).collect();
            let head: String = pair[1].chars().take(150).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn unique_spans_reconstruct_text() {
        let text: String = ('a'..='z').cycle().take(2000).collect();
        let chunks = chunk_text(&text, 900, 150);
        let mut rebuilt = chunks[0].clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.chars().skip(150));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn overlap_ge_size_does_not_loop() {
        let text = "abcdefghij";
        let chunks = chunk_text(text, 3, 5);
        // Stride clamps to 1: windows at every offset.
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[0], "abc");
        assert_eq!(chunks[9], "j");
    }

    #[test]
    fn trailing_whitespace_tail_dropped() {
        let mut text = "x".repeat(10);
        text.push_str("   ");
        let chunks = chunk_text(&text, 10, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "x".repeat(10));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "héllo wörld ".repeat(100);
        let chunks = chunk_text(&text, 50, 10);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 50);
        }
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        assert_eq!(chunk_id("cv-2025", 0), "cv-2025-0");
        assert_eq!(chunk_id("cv-2025", 7), "cv-2025-7");
    }
}
