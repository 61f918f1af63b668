//! Positional document chunking.
//!
//! Splits normalized text into overlapping fixed-size windows. No sentence or
//! paragraph awareness; windowing is purely positional over characters.

/// Collapse all whitespace runs to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows of at most `size` characters.
///
/// Consecutive windows overlap by `overlap` characters; the final window may
/// be shorter. The start offset always advances by at least one character,
/// so `overlap >= size` degrades to single-character steps instead of
/// looping forever.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();

    if chars.is_empty() || size == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_before_windowing() {
        let chunks = chunk_text("hello\n\t  world\r\n  again", 100, 0);
        assert_eq!(chunks, vec!["hello world again".to_string()]);
    }

    #[test]
    fn windows_overlap_by_exactly_the_requested_amount() {
        let text = "abcdefghij";
        let chunks = chunk_text(text, 4, 2);

        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij", "ij"]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].len() - 2).collect();
            let head: String = pair[1].chars().take(2).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn final_chunk_may_be_shorter() {
        let chunks = chunk_text("abcdefg", 3, 0);
        assert_eq!(chunks, vec!["abc", "def", "g"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog";
        assert_eq!(chunk_text(text, 10, 3), chunk_text(text, 10, 3));
    }

    #[test]
    fn terminates_when_overlap_reaches_or_exceeds_size() {
        // Degenerate parameters must fall back to single-character steps.
        let chunks = chunk_text("abcdef", 3, 3);
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0], "abc");
        assert_eq!(chunks[5], "f");

        let worse = chunk_text("abcdef", 2, 10);
        assert_eq!(worse.len(), 6);
    }

    #[test]
    fn empty_and_whitespace_only_text_yield_no_chunks() {
        assert!(chunk_text("", 10, 2).is_empty());
        assert!(chunk_text(" \n\t ", 10, 2).is_empty());
        assert!(chunk_text("content", 0, 0).is_empty());
    }

    #[test]
    fn handles_multibyte_characters_by_character_count() {
        let chunks = chunk_text("héllo wörld", 5, 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks[0], "héllo");
    }
}
