//! Source file discovery and block comment extraction.
//!
//! The scanner walks the configured root in stable (sorted) order, lexes
//! every matching file for block comments, and hands the normalized comment
//! stream to the aggregation stage. File order and within-file order are
//! what placeholder resolution and default fragment ordering key off, so the
//! traversal must be deterministic.

use crate::{
    codec::{comment::normalize_block_comment, CommentStyle, LANGUAGES},
    error::SyncError,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// One raw comment, decoration already stripped, positioned for ordering
/// and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    pub file: String,
    pub line: usize,
    pub text: String,
}

/// One scanned file's comments, in top-to-bottom order.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub comments: Vec<RawComment>,
}

/// Produces the lazy, finite, ordered comment sequence for a run.
/// Restartable per run; never shared across runs.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        FileScanner {
            root: root.into(),
            extensions,
        }
    }

    /// Walk the root and extract comments from every matching file.
    pub fn scan(&self) -> Result<Vec<SourceFile>, SyncError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry =
                entry.map_err(|err| SyncError::Io(format!("walking {:?}: {err}", self.root)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !self.extensions.iter().any(|allowed| allowed == ext) {
                continue;
            }
            let Some(style) = LANGUAGES.get(ext) else {
                tracing::debug!("no comment style registered for .{ext}, skipping");
                continue;
            };
            let path = entry.path().display().to_string();
            let text = read_text(entry.path())?;
            let comments = match style {
                CommentStyle::CBlock => extract_block_comments(&text, &path),
                CommentStyle::WholeFile => vec![RawComment {
                    file: path.clone(),
                    line: 1,
                    text: text.trim_matches('\n').to_string(),
                }],
            };
            tracing::debug!("scanned {path}: {} comments", comments.len());
            files.push(SourceFile { path, comments });
        }
        tracing::info!("scanned {} files under {:?}", files.len(), self.root);
        Ok(files)
    }
}

/// Read a file as UTF-8, falling back to a Latin-1 interpretation.
fn read_text(path: &Path) -> Result<String, SyncError> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err
            .into_bytes()
            .iter()
            .map(|b| *b as char)
            .collect::<String>(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexState {
    Code,
    LineComment,
    BlockComment,
    StringLit,
    CharLit,
}

/// Extract `/* ... */` comments, skipping string literals, character
/// literals and `//` line comments.
fn extract_block_comments(source: &str, file: &str) -> Vec<RawComment> {
    let mut comments = Vec::new();
    let mut state = LexState::Code;
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut buf = String::new();
    let mut escaped = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match state {
            LexState::Code => match c {
                '/' => match chars.peek() {
                    Some('*') => {
                        chars.next();
                        state = LexState::BlockComment;
                        start_line = line;
                        buf.clear();
                        buf.push_str("/*");
                    }
                    Some('/') => {
                        chars.next();
                        state = LexState::LineComment;
                    }
                    _ => {}
                },
                '"' => {
                    state = LexState::StringLit;
                    escaped = false;
                }
                '\'' => {
                    state = LexState::CharLit;
                    escaped = false;
                }
                _ => {}
            },
            LexState::LineComment => {
                if c == '\n' {
                    state = LexState::Code;
                }
            }
            LexState::BlockComment => {
                buf.push(c);
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    buf.push('/');
                    comments.push(RawComment {
                        file: file.to_string(),
                        line: start_line,
                        text: normalize_block_comment(&buf),
                    });
                    state = LexState::Code;
                }
            }
            LexState::StringLit => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    state = LexState::Code;
                }
            }
            LexState::CharLit => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '\'' {
                    state = LexState::Code;
                }
            }
        }
    }
    comments
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KOTLIN: &str = r#"
/* COMMENT 1 */
fun main() {
    val name = "Kotlin"
    /*** COMMENT 2 */
    println("Hello, " + name + "!")

    /*
        COMMENT 3
         - indented
     */
    for (i in 1..5) {
        /**
         * COMMENT 4
         *  this is a comment
         */
        println("i = $i")
    }
    /**
     * *COMMENT 5*
     *  - note
     */
}
"#;

    #[test]
    fn extracts_and_normalizes_block_comments() {
        let comments = extract_block_comments(SAMPLE_KOTLIN, "Sample.kt");
        let bodies: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            bodies,
            vec![
                "COMMENT 1",
                "COMMENT 2",
                "COMMENT 3\n - indented",
                "COMMENT 4\n this is a comment",
                "*COMMENT 5*\n - note",
            ]
        );
    }

    #[test]
    fn comment_lines_are_recorded() {
        let comments = extract_block_comments("val x = 1\n/* here */\n", "A.kt");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].line, 2);
    }

    #[test]
    fn string_literals_do_not_open_comments() {
        let source = "val s = \"/* not a comment */\"\n/* real */\n";
        let comments = extract_block_comments(source, "A.kt");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "real");
    }

    #[test]
    fn line_comments_hide_block_openers() {
        let source = "// leading /* nope\nval x = 1 /* yes */\n";
        let comments = extract_block_comments(source, "A.kt");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "yes");
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        let source = "val s = \"a\\\"/*\"\n/* ok */\n";
        let comments = extract_block_comments(source, "A.kt");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "ok");
    }

    #[test]
    fn scanner_walks_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.kt"), "/* DOCS.B */").unwrap();
        std::fs::write(dir.path().join("a.kt"), "/* DOCS.A */").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "/* nope */").unwrap();
        let scanner = FileScanner::new(dir.path(), vec!["kt".to_string()]);
        let files = scanner.scan().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("a.kt"));
        assert!(files[1].path.ends_with("b.kt"));
    }

    #[test]
    fn markdown_files_are_one_pseudo_comment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.md"), "\nDOCS.App\nbody\n").unwrap();
        let scanner = FileScanner::new(dir.path(), vec!["md".to_string()]);
        let files = scanner.scan().unwrap();
        assert_eq!(files[0].comments.len(), 1);
        assert_eq!(files[0].comments[0].text, "DOCS.App\nbody");
    }
}
