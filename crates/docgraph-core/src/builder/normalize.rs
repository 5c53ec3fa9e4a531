use crate::types::LineSpan;
use sha2::{Digest, Sha256};

/// Marker appended to source text cut at the size limit.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// SHA-256 hex digest of `source`. Blank or missing source has no hash.
pub fn content_hash(source: Option<&str>) -> Option<String> {
    let source = source?;
    if source.trim().is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

/// Cut `source` to at most `max_bytes` (on a char boundary) and append the
/// truncation marker.
pub fn truncate_source(source: &str, max_bytes: usize) -> String {
    if source.len() <= max_bytes {
        return source.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !source.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
    out.push_str(&source[..cut]);
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Number of lines in `text` after normalizing `\r\n` and `\r` to `\n`.
/// Empty text has zero lines.
pub fn count_lines(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized.split('\n').count() as i64
}

/// Line span from what the front end reported. A missing end is derived
/// from the source line count.
pub fn derive_span(start: Option<i64>, end: Option<i64>, source: Option<&str>) -> Option<LineSpan> {
    match (start, end) {
        (Some(start), Some(end)) => Some(LineSpan::new(start, end)),
        (Some(start), None) => {
            let lines = source.map(count_lines).unwrap_or(0).max(1);
            Some(LineSpan::new(start, start + lines - 1))
        }
        (None, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_blank_is_none() {
        assert_eq!(content_hash(None), None);
        assert_eq!(content_hash(Some("  \n")), None);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(Some("abc")).as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_source("short", 10), "short");
        let out = truncate_source("abcdefghij", 4);
        assert_eq!(out, format!("abcd{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; a cut at byte 2 would split it
        let out = truncate_source("aéb", 2);
        assert_eq!(out, format!("a{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("one"), 1);
        assert_eq!(count_lines("a\r\nb\r\nc"), 3);
        assert_eq!(count_lines("a\rb"), 2);
    }

    #[test]
    fn test_derive_span() {
        assert_eq!(derive_span(Some(10), None, Some("a\nb\nc")), Some(LineSpan::new(10, 12)));
        assert_eq!(derive_span(Some(3), Some(7), None), Some(LineSpan::new(3, 7)));
        assert_eq!(derive_span(None, Some(7), None), None);
    }
}
