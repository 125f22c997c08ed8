//! Shared construction helpers for lib-level tests.

use crate::scan::RawComment;

pub fn comment(file: &str, line: usize, text: &str) -> RawComment {
    RawComment {
        file: file.to_string(),
        line,
        text: text.to_string(),
    }
}

/// Comments for one file, in top-to-bottom order, from `(line, text)` pairs.
pub fn file_comments(file: &str, entries: &[(usize, &str)]) -> Vec<RawComment> {
    entries
        .iter()
        .map(|(line, text)| comment(file, *line, text))
        .collect()
}
