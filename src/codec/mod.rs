//! Comment grammar parsing.
//!
//! This module turns raw block comments into [`TagDescriptor`]s:
//!
//! - [`comment`] strips comment decoration (delimiters, leading `*` gutters,
//!   common indentation) from a raw comment body.
//! - [`tag`] parses the tag grammar `DOCS[modifiers].segment1.segment2#N`
//!   out of a normalized comment.
//! - [`LANGUAGES`] maps file extensions to the comment syntax the scanner
//!   should lex them with. Register additional extensions via
//!   [`LanguageMap::insert`]:
//!
//! ```rust
//! use docsync_core::codec::{CommentStyle, LANGUAGES};
//!
//! LANGUAGES.insert("scala".to_string(), CommentStyle::CBlock);
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

pub mod comment;
pub mod tag;

pub use tag::{TagDescriptor, DEFAULT_SORT_INDEX, TAG_LITERAL};

/// Global singleton language map with builtin extensions (java, kt, kts, md).
pub static LANGUAGES: Lazy<LanguageMap> = Lazy::new(LanguageMap::create);

/// How block comments are recognized in a source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// C-style `/* ... */` block comments, lexed with awareness of string
    /// literals, character literals and `//` line comments.
    CBlock,
    /// The whole file is one pseudo-comment (markdown documents).
    WholeFile,
}

/// Registry mapping file extensions to [`CommentStyle`]s.
pub struct LanguageMap(Arc<RwLock<Vec<(String, CommentStyle)>>>);

impl Clone for LanguageMap {
    fn clone(&self) -> Self {
        LanguageMap(self.0.clone())
    }
}

impl LanguageMap {
    pub fn create() -> Self {
        LanguageMap(Arc::new(RwLock::new(vec![
            ("java".to_string(), CommentStyle::CBlock),
            ("kt".to_string(), CommentStyle::CBlock),
            ("kts".to_string(), CommentStyle::CBlock),
            ("md".to_string(), CommentStyle::WholeFile),
        ])))
    }

    pub fn insert(&self, extension: String, style: CommentStyle) {
        let mut writer = self.0.write();
        if let Some(entry) = writer.iter_mut().find(|(ext, _)| ext == &extension) {
            entry.1 = style;
        } else {
            writer.push((extension, style));
        }
    }

    pub fn get(&self, ext: &str) -> Option<CommentStyle> {
        let reader = self.0.read();
        reader
            .iter()
            .find(|(lang_ext, _style)| ext == lang_ext)
            .map(|(_lang_ext, style)| *style)
    }

    pub fn extensions(&self) -> Vec<String> {
        let reader = self.0.read();
        reader
            .iter()
            .map(|(lang_ext, _style)| lang_ext.clone())
            .collect::<Vec<String>>()
    }
}
