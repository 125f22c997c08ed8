//! Tag grammar parsing.
//!
//! A tagged comment opens with a tag line of the form
//! `DOCS[modifiers].segment1.segment2#N`:
//!
//! - the fixed literal [`TAG_LITERAL`],
//! - optional bracketed modifiers (`include_all` is the only recognized one),
//! - a dot-separated breadcrumb naming the target page,
//! - an optional trailing `#N` sort index (lower sorts first, default 1000).
//!
//! The bare literal with no breadcrumb is a placeholder reusing the previous
//! breadcrumb seen in the same file. Comments whose first line does not open
//! with the literal are not tags at all.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// The fixed tag literal opening every tagged comment.
pub const TAG_LITERAL: &str = "DOCS";

/// Sort index assigned when a tag carries no `#N` suffix.
pub const DEFAULT_SORT_INDEX: i64 = 1000;

/// Whether a line can open a tagged comment. Used by the comment normalizer
/// to keep tag lines left-aligned, so this accepts placeholders as well.
pub fn is_tag_line(line: &str) -> bool {
    match line.strip_prefix(TAG_LITERAL) {
        None => false,
        Some(rest) => matches!(rest.chars().next(), None | Some('.') | Some('[') | Some('#')),
    }
}

/// One parsed tagged comment. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescriptor {
    /// Breadcrumb segments; empty for a placeholder.
    pub breadcrumb: Vec<String>,
    /// Bare tag reusing the previous breadcrumb in the same file.
    pub is_placeholder: bool,
    /// The `include_all` modifier was present.
    pub include_all: bool,
    /// Ordering key among fragments and siblings; lower sorts first.
    pub sort_index: i64,
    /// Comment text after the tag line, decoration already stripped.
    pub body: String,
    pub source_file: String,
    pub source_line: usize,
}

fn invalid(file: &str, line: usize, reason: impl Into<String>) -> SyncError {
    SyncError::InvalidTag {
        file: file.to_string(),
        line,
        reason: reason.into(),
    }
}

/// Split an optional trailing `#N` sort index off a tag token. Only a
/// trailing `#<integer>` is recognized; any other `#` stays in the segment
/// text.
fn split_sort_index(token: &str) -> (&str, Option<i64>) {
    if let Some(idx) = token.rfind('#') {
        if let Ok(sort) = token[idx + 1..].trim().parse::<i64>() {
            return (&token[..idx], Some(sort));
        }
    }
    (token, None)
}

/// Parse one normalized comment.
///
/// Returns `Ok(None)` when the comment is not a tag at all (its first line
/// does not open with [`TAG_LITERAL`]); such comments are candidates for
/// include-all absorption. Malformed tags fail with
/// [`SyncError::InvalidTag`].
pub fn parse_comment(
    text: &str,
    file: &str,
    line: usize,
) -> Result<Option<TagDescriptor>, SyncError> {
    let mut lines = text.lines();
    let Some(tag_line) = lines.next() else {
        return Ok(None);
    };
    let tag_line = tag_line.trim_end();
    if !is_tag_line(tag_line) {
        return Ok(None);
    }
    let mut rest = &tag_line[TAG_LITERAL.len()..];

    let mut include_all = false;
    if let Some(bracketed) = rest.strip_prefix('[') {
        let Some(close) = bracketed.find(']') else {
            return Err(invalid(file, line, "unterminated modifier list"));
        };
        for modifier in bracketed[..close].split(',') {
            let modifier = modifier.trim();
            match modifier {
                "include_all" => include_all = true,
                "" => {}
                other => {
                    return Err(invalid(file, line, format!("unknown modifier '{other}'")));
                }
            }
        }
        rest = &bracketed[close + 1..];
    }

    let (token, sort) = split_sort_index(rest);
    let sort_index = sort.unwrap_or(DEFAULT_SORT_INDEX);

    let body = {
        let mut body_lines: Vec<&str> = lines.collect();
        while body_lines.first().is_some_and(|l| l.trim().is_empty()) {
            body_lines.remove(0);
        }
        body_lines.join("\n")
    };

    if token.is_empty() {
        // Bare literal: placeholder. Modifiers parse but carry no arming
        // effect; the aggregator ignores them on placeholders.
        return Ok(Some(TagDescriptor {
            breadcrumb: Vec::new(),
            is_placeholder: true,
            include_all,
            sort_index,
            body,
            source_file: file.to_string(),
            source_line: line,
        }));
    }

    let Some(crumb) = token.strip_prefix('.') else {
        return Err(invalid(
            file,
            line,
            format!("expected '.' before breadcrumb, found '{token}'"),
        ));
    };
    let mut breadcrumb = Vec::new();
    for segment in crumb.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(invalid(file, line, "empty breadcrumb segment"));
        }
        breadcrumb.push(segment.to_string());
    }
    if breadcrumb.is_empty() {
        return Err(invalid(file, line, "missing breadcrumb"));
    }

    Ok(Some(TagDescriptor {
        breadcrumb,
        is_placeholder: false,
        include_all,
        sort_index,
        body,
        source_file: file.to_string(),
        source_line: line,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Option<TagDescriptor>, SyncError> {
        parse_comment(text, "Test.kt", 1)
    }

    #[test]
    fn breadcrumb_splits_on_dots() {
        let tag = parse("DOCS.App.Funcs\nbody").unwrap().unwrap();
        assert_eq!(tag.breadcrumb, vec!["App", "Funcs"]);
        assert!(!tag.is_placeholder);
        assert!(!tag.include_all);
        assert_eq!(tag.sort_index, DEFAULT_SORT_INDEX);
        assert_eq!(tag.body, "body");
    }

    #[test]
    fn sort_index_suffix_is_recognized() {
        let tag = parse("DOCS.App.Funcs#2\n- item1\n- item2").unwrap().unwrap();
        assert_eq!(tag.breadcrumb, vec!["App", "Funcs"]);
        assert_eq!(tag.sort_index, 2);
        assert_eq!(tag.body, "- item1\n- item2");
    }

    #[test]
    fn sort_index_may_be_negative() {
        let tag = parse("DOCS.App#-5").unwrap().unwrap();
        assert_eq!(tag.sort_index, -5);
    }

    #[test]
    fn bare_literal_is_a_placeholder() {
        let tag = parse("DOCS\nreused").unwrap().unwrap();
        assert!(tag.is_placeholder);
        assert!(tag.breadcrumb.is_empty());
        assert_eq!(tag.body, "reused");
    }

    #[test]
    fn include_all_modifier_is_parsed() {
        let tag = parse("DOCS[include_all].App\nbody").unwrap().unwrap();
        assert!(tag.include_all);
        assert_eq!(tag.breadcrumb, vec!["App"]);
    }

    #[test]
    fn unknown_modifier_is_rejected() {
        let err = parse("DOCS[frobnicate].App").unwrap_err();
        assert!(matches!(err, SyncError::InvalidTag { .. }));
    }

    #[test]
    fn empty_segment_is_rejected() {
        assert!(parse("DOCS.App..Funcs").is_err());
        assert!(parse("DOCS.").is_err());
    }

    #[test]
    fn non_tag_comments_are_untagged() {
        assert_eq!(parse("just a comment").unwrap(), None);
        // A longer identifier sharing the prefix is not a tag.
        assert_eq!(parse("DOCSIFY.App").unwrap(), None);
    }

    #[test]
    fn body_leading_blank_lines_are_dropped() {
        let tag = parse("DOCS.App\n\n\nSays hello").unwrap().unwrap();
        assert_eq!(tag.body, "Says hello");
    }

    #[test]
    fn reparsing_is_deterministic() {
        let a = parse("DOCS[include_all].App.B#7\nbody").unwrap();
        let b = parse("DOCS[include_all].App.B#7\nbody").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_without_integer_stays_in_segment() {
        let tag = parse("DOCS.C# Notes").unwrap().unwrap();
        assert_eq!(tag.breadcrumb, vec!["C# Notes"]);
        assert_eq!(tag.sort_index, DEFAULT_SORT_INDEX);
    }
}
