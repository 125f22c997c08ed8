//! The remote page store capability.
//!
//! The sync stages consume the remote service through [`RemotePageStore`],
//! an abstract capability covering exactly what reconciliation needs: root
//! lookup, child listing, page creation, content replacement, fingerprint
//! property refresh and sibling moves. Each remote page persists two scalar
//! properties (`text_hash`, `subtree_hash`) besides its title and content;
//! these are the only state a rerun reads back.
//!
//! [`MemoryPageStore`] is the reference implementation: fully in-process,
//! with real sibling ordering. The `service` feature adds an HTTP-backed
//! implementation in [`crate::client`].

use crate::error::SyncError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One remote page as the core sees it. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub id: String,
    pub title: String,
    /// Stored `text_hash` property, absent on pages never written by a run.
    pub text_hash: Option<String>,
    /// Stored `subtree_hash` property.
    pub subtree_hash: Option<String>,
    pub parent_id: Option<String>,
}

/// One inline span of rendered content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub code: bool,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        RichText {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// One rendered content block, ready for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteBlock {
    Heading {
        /// Clamped to 1..=3.
        level: u8,
        rich_text: Vec<RichText>,
    },
    Paragraph {
        rich_text: Vec<RichText>,
    },
    BulletItem {
        rich_text: Vec<RichText>,
    },
    Code {
        language: String,
        text: String,
    },
}

pub type RemoteBlocks = Vec<RemoteBlock>;

/// Abstract remote hierarchical-page capability.
///
/// Implementations own transport concerns entirely (authentication,
/// pagination, retries). The core calls each method once per planned
/// operation and treats every error as that node's own failure.
#[async_trait]
pub trait RemotePageStore: Send + Sync {
    /// The configured root page the document tree is anchored under.
    async fn root(&self) -> Result<RemoteNode, SyncError>;

    /// Child pages of `id`, in current remote sibling order.
    async fn children(&self, id: &str) -> Result<Vec<RemoteNode>, SyncError>;

    /// Create a page and return its id.
    async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
        blocks: &[RemoteBlock],
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<String, SyncError>;

    /// Replace a page's content and both fingerprint properties.
    async fn update_page(
        &self,
        id: &str,
        blocks: &[RemoteBlock],
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<(), SyncError>;

    /// Refresh only the fingerprint properties, leaving content untouched.
    async fn update_hashes(
        &self,
        id: &str,
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<(), SyncError>;

    /// Position `id` directly after `after` among its siblings, or first
    /// when `after` is `None`.
    async fn move_page(&self, id: &str, after: Option<&str>) -> Result<(), SyncError>;
}

#[derive(Debug, Clone)]
struct PageRecord {
    title: String,
    parent_id: Option<String>,
    text_hash: Option<String>,
    subtree_hash: Option<String>,
    blocks: RemoteBlocks,
}

#[derive(Debug, Default)]
struct MemoryInner {
    pages: HashMap<String, PageRecord>,
    /// Sibling order per parent id.
    order: HashMap<String, Vec<String>>,
    next_id: u64,
    /// Titles whose mutations fail, for failure-containment tests.
    poisoned: HashSet<String>,
}

/// In-process [`RemotePageStore`] with real sibling ordering.
#[derive(Debug)]
pub struct MemoryPageStore {
    root_id: String,
    inner: Mutex<MemoryInner>,
}

impl MemoryPageStore {
    pub fn new(root_id: impl Into<String>) -> Self {
        let root_id = root_id.into();
        let mut inner = MemoryInner::default();
        inner.pages.insert(
            root_id.clone(),
            PageRecord {
                title: "root".to_string(),
                parent_id: None,
                text_hash: None,
                subtree_hash: None,
                blocks: Vec::new(),
            },
        );
        MemoryPageStore {
            root_id,
            inner: Mutex::new(inner),
        }
    }

    /// Make every mutation of pages with this title fail, to exercise
    /// per-node failure containment.
    pub fn poison_title(&self, title: impl Into<String>) {
        self.inner.lock().poisoned.insert(title.into());
    }

    /// Let a poisoned title succeed again.
    pub fn heal_title(&self, title: &str) {
        self.inner.lock().poisoned.remove(title);
    }

    /// Current child titles of `id`, in sibling order.
    pub fn child_titles(&self, id: &str) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|child| inner.pages.get(child).map(|p| p.title.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored fingerprint properties of a page, by title.
    pub fn hashes_by_title(&self, title: &str) -> Option<(Option<String>, Option<String>)> {
        let inner = self.inner.lock();
        inner
            .pages
            .values()
            .find(|p| p.title == title)
            .map(|p| (p.text_hash.clone(), p.subtree_hash.clone()))
    }

    /// Stored content blocks of a page, by title.
    pub fn blocks_by_title(&self, title: &str) -> Option<RemoteBlocks> {
        let inner = self.inner.lock();
        inner
            .pages
            .values()
            .find(|p| p.title == title)
            .map(|p| p.blocks.clone())
    }

    pub fn page_count(&self) -> usize {
        self.inner.lock().pages.len()
    }

    fn node(inner: &MemoryInner, id: &str) -> Result<RemoteNode, SyncError> {
        inner
            .pages
            .get(id)
            .map(|p| RemoteNode {
                id: id.to_string(),
                title: p.title.clone(),
                text_hash: p.text_hash.clone(),
                subtree_hash: p.subtree_hash.clone(),
                parent_id: p.parent_id.clone(),
            })
            .ok_or_else(|| SyncError::NotFound(format!("no page with id {id}")))
    }

    fn check_poison(inner: &MemoryInner, title: &str) -> Result<(), SyncError> {
        if inner.poisoned.contains(title) {
            return Err(SyncError::Remote {
                path: title.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemotePageStore for MemoryPageStore {
    async fn root(&self) -> Result<RemoteNode, SyncError> {
        let inner = self.inner.lock();
        Self::node(&inner, &self.root_id)
    }

    async fn children(&self, id: &str) -> Result<Vec<RemoteNode>, SyncError> {
        let inner = self.inner.lock();
        let Some(ids) = inner.order.get(id) else {
            return Ok(Vec::new());
        };
        ids.iter().map(|child| Self::node(&inner, child)).collect()
    }

    async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
        blocks: &[RemoteBlock],
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<String, SyncError> {
        let mut inner = self.inner.lock();
        Self::check_poison(&inner, title)?;
        if !inner.pages.contains_key(parent_id) {
            return Err(SyncError::NotFound(format!("no page with id {parent_id}")));
        }
        inner.next_id += 1;
        let id = format!("page-{}", inner.next_id);
        inner.pages.insert(
            id.clone(),
            PageRecord {
                title: title.to_string(),
                parent_id: Some(parent_id.to_string()),
                text_hash: Some(text_hash.to_string()),
                subtree_hash: Some(subtree_hash.to_string()),
                blocks: blocks.to_vec(),
            },
        );
        inner
            .order
            .entry(parent_id.to_string())
            .or_default()
            .push(id.clone());
        tracing::debug!("created page '{title}' as {id} under {parent_id}");
        Ok(id)
    }

    async fn update_page(
        &self,
        id: &str,
        blocks: &[RemoteBlock],
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let title = inner
            .pages
            .get(id)
            .map(|p| p.title.clone())
            .ok_or_else(|| SyncError::NotFound(format!("no page with id {id}")))?;
        Self::check_poison(&inner, &title)?;
        if let Some(page) = inner.pages.get_mut(id) {
            page.blocks = blocks.to_vec();
            page.text_hash = Some(text_hash.to_string());
            page.subtree_hash = Some(subtree_hash.to_string());
        }
        Ok(())
    }

    async fn update_hashes(
        &self,
        id: &str,
        text_hash: &str,
        subtree_hash: &str,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let title = inner
            .pages
            .get(id)
            .map(|p| p.title.clone())
            .ok_or_else(|| SyncError::NotFound(format!("no page with id {id}")))?;
        Self::check_poison(&inner, &title)?;
        if let Some(page) = inner.pages.get_mut(id) {
            page.text_hash = Some(text_hash.to_string());
            page.subtree_hash = Some(subtree_hash.to_string());
        }
        Ok(())
    }

    async fn move_page(&self, id: &str, after: Option<&str>) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let (title, parent_id) = inner
            .pages
            .get(id)
            .map(|p| (p.title.clone(), p.parent_id.clone()))
            .ok_or_else(|| SyncError::NotFound(format!("no page with id {id}")))?;
        Self::check_poison(&inner, &title)?;
        let parent_id = parent_id
            .ok_or_else(|| SyncError::Remote {
                path: id.to_string(),
                reason: "cannot move the root page".to_string(),
            })?;
        let Some(order) = inner.order.get_mut(&parent_id) else {
            return Err(SyncError::NotFound(format!("no children under {parent_id}")));
        };
        order.retain(|existing| existing != id);
        let insert_at = match after {
            None => 0,
            Some(after_id) => {
                order
                    .iter()
                    .position(|existing| existing == after_id)
                    .ok_or_else(|| SyncError::NotFound(format!("no sibling {after_id}")))?
                    + 1
            }
        };
        order.insert(insert_at, id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_list_and_move_children() {
        let store = MemoryPageStore::new("root");
        let a = store.create_page("root", "A", &[], "t", "s").await.unwrap();
        let _b = store.create_page("root", "B", &[], "t", "s").await.unwrap();
        let c = store.create_page("root", "C", &[], "t", "s").await.unwrap();
        assert_eq!(store.child_titles("root"), vec!["A", "B", "C"]);

        store.move_page(&c, None).await.unwrap();
        assert_eq!(store.child_titles("root"), vec!["C", "A", "B"]);

        store.move_page(&c, Some(&a)).await.unwrap();
        assert_eq!(store.child_titles("root"), vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn poisoned_titles_fail_mutations() {
        let store = MemoryPageStore::new("root");
        store.poison_title("Bad");
        assert!(store.create_page("root", "Bad", &[], "t", "s").await.is_err());
        assert!(store.create_page("root", "Good", &[], "t", "s").await.is_ok());
    }

    #[test]
    fn block_serialization_is_tagged() {
        let block = RemoteBlock::Heading {
            level: 2,
            rich_text: vec![RichText::plain("Title")],
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "heading");
        assert_eq!(json["level"], 2);
    }
}
