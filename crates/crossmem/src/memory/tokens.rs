//! Token and memory-usage estimation
//!
//! Both estimators are heuristics. They only need to be deterministic and
//! monotonic in content size, since budgets are enforced against them.

use std::collections::HashMap;

/// Approximate bytes per token
pub const BYTES_PER_TOKEN: usize = 4;

/// Fixed per-entry bookkeeping overhead (ids, timestamps, indices)
pub const ENTRY_OVERHEAD_BYTES: u64 = 256;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimate the token count of a piece of text (~4 bytes per token, rounded up).
///
/// Any non-empty text costs at least one token.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(BYTES_PER_TOKEN)
}

/// Estimated resident size of an entry in bytes
pub fn estimate_entry_bytes(content: &str, metadata: &HashMap<String, String>) -> u64 {
    let metadata_bytes: usize = metadata.iter().map(|(k, v)| k.len() + v.len()).sum();
    content.len() as u64 + metadata_bytes as u64 + ENTRY_OVERHEAD_BYTES
}

/// Convert an estimated byte count to megabytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Longest prefix of `text` that is at most `max_chars` characters.
///
/// Appends an ellipsis when the text was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", trimmed[..byte_idx].trim_end()),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_entry_bytes_monotonic_in_content() {
        let meta = HashMap::new();
        let small = estimate_entry_bytes("short", &meta);
        let large = estimate_entry_bytes("a considerably longer piece of content", &meta);
        assert!(large > small);
        assert_eq!(small, 5 + ENTRY_OVERHEAD_BYTES);
    }

    #[test]
    fn test_entry_bytes_counts_metadata() {
        let mut meta = HashMap::new();
        meta.insert("topic".to_string(), "rust".to_string());
        assert_eq!(estimate_entry_bytes("", &meta), 9 + ENTRY_OVERHEAD_BYTES);
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(0), 0.0);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("hello", 10), "hello");
        assert_eq!(excerpt("hello world", 5), "hello…");
        assert_eq!(excerpt("héllo wörld", 4), "héll…");
        assert_eq!(excerpt("  padded  ", 10), "padded");
    }
}
