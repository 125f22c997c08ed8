use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/// Crate-wide error type.
///
/// Parse-stage failures ([`SyncError::InvalidTag`],
/// [`SyncError::DanglingPlaceholder`]) are local to a single comment and are
/// collected as diagnostics rather than aborting a run. Remote-stage failures
/// ([`SyncError::Remote`]) are contained to the node that raised them and its
/// subtree. Everything else is fatal to the operation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum SyncError {
    #[error("ambiguous match at '{path}' for segment '{segment}': candidates {titles:?}")]
    AmbiguousMatch {
        path: String,
        segment: String,
        titles: Vec<String>,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{file}:{line}: placeholder tag with no prior breadcrumb in file")]
    DanglingPlaceholder { file: String, line: usize },
    #[error("{file}:{line}: invalid tag: {reason}")]
    InvalidTag {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Remote operation failed for '{path}': {reason}")]
    Remote { path: String, reason: String },
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether this error fails a single comment rather than the whole run.
    pub fn is_comment_local(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidTag { .. } | SyncError::DanglingPlaceholder { .. }
        )
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(src: toml::de::Error) -> SyncError {
        SyncError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(src: toml::ser::Error) -> SyncError {
        SyncError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for SyncError {
    fn from(src: JsonError) -> SyncError {
        SyncError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for SyncError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SyncError::NotFound(format!("{x}")),
            _ => SyncError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for SyncError {
    fn from(x: fmt::Error) -> Self {
        SyncError::Io(format!("{x}"))
    }
}

impl From<RegexError> for SyncError {
    fn from(x: RegexError) -> Self {
        SyncError::Serialization(format!("Regex parse failed: {x}"))
    }
}

#[cfg(feature = "service")]
impl From<reqwest::Error> for SyncError {
    fn from(x: reqwest::Error) -> Self {
        SyncError::Remote {
            path: x.url().map(|u| u.to_string()).unwrap_or_default(),
            reason: format!("{x}"),
        }
    }
}
