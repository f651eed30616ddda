//! Text transforms behind the file mutators. No I/O.

/// Replace the first occurrence of `search` in `content`.
///
/// Later occurrences are left alone. Content without a match comes back
/// unchanged.
pub fn replace_first(content: &str, search: &str, replacement: &str) -> String {
    content.replacen(search, replacement, 1)
}

/// Whether `line` is already present anywhere in `content`.
///
/// Plain substring match: text that appears inside a longer line counts as
/// present too.
pub fn contains_line(content: &str, line: &str) -> bool {
    content.contains(line)
}
