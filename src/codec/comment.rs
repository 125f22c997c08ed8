//! Block comment decoration stripping.
//!
//! Raw comment text arrives with its delimiters and gutter decoration intact.
//! [`normalize_block_comment`] reduces it to the markdown the author wrote:
//! delimiters are blanked in place (not removed) so that column alignment
//! survives until the common indentation trim, then `*` gutters and shared
//! indentation are stripped.

use crate::codec::tag::is_tag_line;

/// Leading whitespace run of a line, spaces and tabs only.
fn leading_ws(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| *c != ' ' && *c != '\t')
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// Trim the maximum common indentation among non-empty lines.
fn trim_common_indent(lines: &mut [String]) {
    let mut common: Option<String> = None;
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let ws = leading_ws(line);
        match common.as_mut() {
            None => common = Some(ws.to_string()),
            Some(prefix) => {
                while !prefix.is_empty() && !ws.starts_with(prefix.as_str()) {
                    prefix.pop();
                }
            }
        }
    }
    let Some(common) = common.filter(|c| !c.is_empty()) else {
        return;
    };
    for line in lines.iter_mut() {
        if line.starts_with(&common) {
            *line = line[common.len()..].to_string();
        }
    }
}

fn pop_empty_edges(lines: &mut Vec<String>) {
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
}

/// A line carrying the `*` gutter: optional single space or tab, then `*`.
fn is_star_line(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('*') => true,
        Some(' ') | Some('\t') => chars.next() == Some('*'),
        _ => false,
    }
}

fn strip_star(line: &str) -> String {
    let mut rest = if let Some(stripped) = line.strip_prefix('*') {
        stripped
    } else if let Some(stripped) = line.strip_prefix(" *") {
        stripped
    } else {
        return line.to_string();
    };
    if let Some(stripped) = rest.strip_prefix(' ') {
        rest = stripped;
    }
    rest.to_string()
}

/// Normalize one raw block comment into plain text.
///
/// Blanks the `/*`+ opening and `*`+`/` closing delimiters in place, drops
/// blank edge lines, trims the maximum common indentation, strips the `*`
/// gutter when every non-empty line (or every one after the first) carries
/// it, and left-aligns a leading tag line together with its tail.
pub fn normalize_block_comment(raw: &str) -> String {
    let mut s = raw.to_string();
    if s.starts_with("/*") {
        let stars = s.bytes().skip(1).take_while(|b| *b == b'*').count();
        let span = 1 + stars;
        s.replace_range(0..span, &" ".repeat(span));
    }
    let trimmed = s.trim_end().len();
    if s[..trimmed].ends_with("*/") {
        let stars = s[..trimmed - 1]
            .bytes()
            .rev()
            .take_while(|b| *b == b'*')
            .count();
        let start = trimmed - 1 - stars;
        s.replace_range(start..trimmed, &" ".repeat(stars + 1));
    }

    let mut lines: Vec<String> = s.lines().map(|l| l.to_string()).collect();
    pop_empty_edges(&mut lines);
    if lines.is_empty() {
        return String::new();
    }
    trim_common_indent(&mut lines);

    let non_empty: Vec<&str> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.as_str())
        .collect();
    let should_star_strip = match non_empty.split_first() {
        None => false,
        Some((first, tail)) => {
            non_empty.iter().all(|l| is_star_line(l))
                || (!tail.is_empty() && tail.iter().all(|l| is_star_line(l)))
                || (is_tag_line(first.trim_start()) && tail.iter().all(|l| is_star_line(l)))
        }
    };
    if should_star_strip {
        for line in lines.iter_mut() {
            *line = strip_star(line);
        }
        trim_common_indent(&mut lines);
    }
    pop_empty_edges(&mut lines);

    // A tag line must not stay indented; realign the tail with it.
    if lines
        .first()
        .is_some_and(|l| is_tag_line(l.trim_start()))
    {
        lines[0] = lines[0].trim_start_matches([' ', '\t']).to_string();
        let mut tail_common: Option<String> = None;
        for line in lines.iter().skip(1).filter(|l| !l.trim().is_empty()) {
            let ws = leading_ws(line);
            match tail_common.as_mut() {
                None => tail_common = Some(ws.to_string()),
                Some(prefix) => {
                    while !prefix.is_empty() && !ws.starts_with(prefix.as_str()) {
                        prefix.pop();
                    }
                }
            }
        }
        if let Some(common) = tail_common.filter(|c| !c.is_empty()) {
            for line in lines.iter_mut().skip(1) {
                if line.starts_with(&common) {
                    *line = line[common.len()..].to_string();
                }
            }
        }
    }

    let joined = lines
        .iter()
        .map(|l| if l.trim().is_empty() { "" } else { l.as_str() })
        .collect::<Vec<_>>()
        .join("\n");
    joined.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_comment_loses_delimiters() {
        assert_eq!(normalize_block_comment("/* COMMENT 1 */"), "COMMENT 1");
        assert_eq!(normalize_block_comment("/*** COMMENT 2 */"), "COMMENT 2");
    }

    #[test]
    fn indented_body_keeps_relative_indentation() {
        let raw = "/*\n        COMMENT 3\n         - indented\n     */";
        assert_eq!(normalize_block_comment(raw), "COMMENT 3\n - indented");
    }

    #[test]
    fn star_gutter_is_stripped() {
        let raw = "/**\n         * COMMENT 4\n         *  this is a comment\n         */";
        assert_eq!(
            normalize_block_comment(raw),
            "COMMENT 4\n this is a comment"
        );
    }

    #[test]
    fn leading_emphasis_survives_gutter_strip() {
        let raw = "/**\n     * *COMMENT 5*\n     *  - note\n     */";
        assert_eq!(normalize_block_comment(raw), "*COMMENT 5*\n - note");
    }

    #[test]
    fn tag_line_is_left_aligned() {
        let raw = "/*\n     DOCS.App\n     body line\n */";
        assert_eq!(normalize_block_comment(raw), "DOCS.App\nbody line");
    }

    #[test]
    fn empty_comment_normalizes_to_empty() {
        assert_eq!(normalize_block_comment("/* */"), "");
        assert_eq!(normalize_block_comment("/**\n *\n */"), "");
    }

    #[test]
    fn internal_blank_lines_become_empty_strings() {
        let raw = "/*\n * first\n *\n * second\n */";
        assert_eq!(normalize_block_comment(raw), "first\n\nsecond");
    }
}
