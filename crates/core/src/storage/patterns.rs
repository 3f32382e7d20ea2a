//! Pure matching for SQL `LIKE` patterns.
//!
//! `%` matches any sequence of characters (including none). Matching is
//! case-insensitive, like the default collation of most databases.

/// Checks if `value` matches a `LIKE` pattern.
///
/// # Examples
///
/// ```
/// use repocache_core::storage::like_matches;
///
/// assert!(like_matches("ada%", "Ada Lovelace"));
/// assert!(like_matches("%@example.com", "ada@example.com"));
/// assert!(like_matches("%love%", "Ada Lovelace"));
/// assert!(!like_matches("bob%", "Ada Lovelace"));
/// ```
pub fn like_matches(pattern: &str, value: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let value = value.to_lowercase();

    if pattern.is_empty() {
        return value.is_empty();
    }

    if pattern == "%" {
        return true;
    }

    let segments: Vec<&str> = pattern.split('%').collect();

    // No wildcard: exact match
    if segments.len() == 1 {
        return pattern == value;
    }

    let mut remaining = value.as_str();
    let starts_with_wildcard = pattern.starts_with('%');
    let ends_with_wildcard = pattern.ends_with('%');

    for (i, segment) in segments.iter().enumerate() {
        // Leading, trailing or adjacent wildcards
        if segment.is_empty() {
            continue;
        }

        let is_first = i == 0;
        let is_last = i == segments.len() - 1;

        if is_first && !starts_with_wildcard {
            if !remaining.starts_with(segment) {
                return false;
            }
            remaining = &remaining[segment.len()..];
        } else if is_last && !ends_with_wildcard {
            return remaining.ends_with(segment);
        } else {
            match remaining.find(segment) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }
    }

    true
}
