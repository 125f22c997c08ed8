//! The canonical document tree.
//!
//! Fragments parsed from tagged comments aggregate into a [`DocTree`]: an
//! arena of [`DocNode`]s keyed by their full [`Breadcrumb`] path. Keying by
//! path (rather than holding child pointers) makes the merge rule structural:
//! two fragments with the same breadcrumb land in the same node because the
//! map can only hold one entry for that key.

use crate::{
    codec::tag::{self, DEFAULT_SORT_INDEX},
    error::SyncError,
    scan::RawComment,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{Display, Formatter},
};

/// Ordered path of segment names identifying a node's position in the
/// document hierarchy. The empty breadcrumb is the tree root.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Breadcrumb(Vec<String>);

impl Breadcrumb {
    pub fn root() -> Self {
        Breadcrumb(Vec::new())
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Breadcrumb(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Final path segment, absent for the root.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }

    pub fn parent(&self) -> Option<Breadcrumb> {
        if self.0.is_empty() {
            None
        } else {
            Some(Breadcrumb(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, segment: &str) -> Breadcrumb {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Breadcrumb(segments)
    }

    fn prefix(&self, depth: usize) -> Breadcrumb {
        Breadcrumb(self.0[..depth].to_vec())
    }
}

impl Display for Breadcrumb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.0.join(" / "))
        }
    }
}

/// One parsed comment's contribution to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub sort_index: i64,
    pub source_file: String,
    pub source_line: usize,
    pub body: String,
}

impl Fragment {
    /// Canonical ordering key: sort index primary, then source position.
    fn key(&self) -> (i64, &str, usize) {
        (self.sort_index, self.source_file.as_str(), self.source_line)
    }
}

/// One logical page. Owned exclusively by the tree; never shared or aliased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocNode {
    pub path: Breadcrumb,
    /// Contributing fragments, in arrival order; canonicalized on read.
    pub fragments: Vec<Fragment>,
    /// Child segment names in first-seen order; re-sorted for sync.
    pub children: Vec<String>,
    /// The node's own ordering key among siblings: the minimum over its
    /// fragments' sort indexes, 1000 for pure structural ancestors.
    pub sort_index: i64,
    /// Absent until the fingerprint pass runs.
    pub text_hash: Option<String>,
    pub subtree_hash: Option<String>,
}

impl DocNode {
    fn new(path: Breadcrumb) -> Self {
        DocNode {
            path,
            fragments: Vec::new(),
            children: Vec::new(),
            sort_index: DEFAULT_SORT_INDEX,
            text_hash: None,
            subtree_hash: None,
        }
    }

    /// Fragments in canonical `(sort_index, file, line)` order.
    pub fn canonical_fragments(&self) -> Vec<&Fragment> {
        let mut fragments: Vec<&Fragment> = self.fragments.iter().collect();
        fragments.sort_by(|a, b| a.key().cmp(&b.key()));
        fragments
    }

    /// Final textual content: non-empty fragment bodies joined in canonical
    /// order with a blank line separator.
    pub fn content(&self) -> String {
        self.canonical_fragments()
            .iter()
            .map(|f| f.body.as_str())
            .filter(|body| !body.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Arena of [`DocNode`]s keyed by canonical path. The root is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocTree {
    nodes: BTreeMap<Breadcrumb, DocNode>,
}

impl DocTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(Breadcrumb::root(), DocNode::new(Breadcrumb::root()));
        DocTree { nodes }
    }

    pub fn get(&self, path: &Breadcrumb) -> Option<&DocNode> {
        self.nodes.get(path)
    }

    pub fn get_mut(&mut self, path: &Breadcrumb) -> Option<&mut DocNode> {
        self.nodes.get_mut(path)
    }

    pub fn contains(&self, path: &Breadcrumb) -> bool {
        self.nodes.contains_key(path)
    }

    /// Node count, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Breadcrumb, DocNode> {
        self.nodes.iter()
    }

    /// Children of a node in canonical `(sort_index, segment)` order. This is
    /// the desired sibling order remotely and the order subtree hashing uses.
    pub fn sorted_children(&self, path: &Breadcrumb) -> Vec<Breadcrumb> {
        let Some(node) = self.nodes.get(path) else {
            return Vec::new();
        };
        let mut children: Vec<(i64, &String)> = node
            .children
            .iter()
            .map(|segment| {
                let sort = self
                    .nodes
                    .get(&path.child(segment))
                    .map(|child| child.sort_index)
                    .unwrap_or(DEFAULT_SORT_INDEX);
                (sort, segment)
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        children
            .into_iter()
            .map(|(_sort, segment)| path.child(segment))
            .collect()
    }

    /// Locate-or-create the chain of nodes from the root down to `path`.
    /// Intermediate ancestors are created with empty content; a node can
    /// exist purely as a structural ancestor.
    fn ensure_chain(&mut self, path: &Breadcrumb) {
        for depth in 1..=path.len() {
            let prefix = path.prefix(depth);
            if self.nodes.contains_key(&prefix) {
                continue;
            }
            if let (Some(parent), Some(leaf)) = (prefix.parent(), prefix.leaf()) {
                let leaf = leaf.to_string();
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    if !parent_node.children.contains(&leaf) {
                        parent_node.children.push(leaf);
                    }
                }
            }
            self.nodes.insert(prefix.clone(), DocNode::new(prefix));
        }
    }

    /// Append a fragment to the node at `path`, creating it and any missing
    /// ancestors.
    pub fn insert_fragment(&mut self, path: &Breadcrumb, fragment: Fragment) {
        self.ensure_chain(path);
        if let Some(node) = self.nodes.get_mut(path) {
            node.sort_index = if node.fragments.is_empty() {
                fragment.sort_index
            } else {
                node.sort_index.min(fragment.sort_index)
            };
            node.fragments.push(fragment);
        }
    }
}

/// Per-file scan state: the breadcrumb placeholders resolve against, and the
/// breadcrumb include-all is armed for, if any. Scoped to one file's scan and
/// never shared across files.
#[derive(Debug, Default)]
struct FileCursor {
    current: Option<Breadcrumb>,
    armed: Option<Breadcrumb>,
}

/// Consumes the ordered stream of comments across all files and builds the
/// canonical [`DocTree`]. Parse failures are collected as diagnostics and
/// never abort aggregation of other comments.
#[derive(Debug, Default)]
pub struct TreeAggregator {
    tree: DocTree,
    diagnostics: Vec<SyncError>,
}

impl TreeAggregator {
    pub fn new() -> Self {
        TreeAggregator {
            tree: DocTree::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Consume one file's comments, in within-file order. The placeholder
    /// cursor is scoped to this call.
    pub fn add_file(&mut self, comments: &[RawComment]) {
        let mut cursor = FileCursor::default();
        for comment in comments {
            match tag::parse_comment(&comment.text, &comment.file, comment.line) {
                Err(err) => {
                    tracing::warn!("{err}");
                    self.diagnostics.push(err);
                }
                Ok(None) => {
                    let Some(armed) = cursor.armed.clone() else {
                        continue;
                    };
                    let body = comment.text.trim().to_string();
                    if body.is_empty() {
                        continue;
                    }
                    tracing::debug!(
                        "absorbing untagged comment at {}:{} under '{armed}'",
                        comment.file,
                        comment.line
                    );
                    self.tree.insert_fragment(
                        &armed,
                        Fragment {
                            sort_index: DEFAULT_SORT_INDEX,
                            source_file: comment.file.clone(),
                            source_line: comment.line,
                            body,
                        },
                    );
                }
                Ok(Some(tag)) => {
                    let crumb = if tag.is_placeholder {
                        match cursor.current.clone() {
                            Some(crumb) => crumb,
                            None => {
                                let err = SyncError::DanglingPlaceholder {
                                    file: comment.file.clone(),
                                    line: comment.line,
                                };
                                tracing::warn!("{err}");
                                self.diagnostics.push(err);
                                continue;
                            }
                        }
                        // Placeholders never change include-all arming.
                    } else {
                        let crumb = Breadcrumb::from_segments(tag.breadcrumb.clone());
                        cursor.current = Some(crumb.clone());
                        cursor.armed = tag.include_all.then(|| crumb.clone());
                        crumb
                    };
                    self.tree.insert_fragment(
                        &crumb,
                        Fragment {
                            sort_index: tag.sort_index,
                            source_file: tag.source_file,
                            source_line: tag.source_line,
                            body: tag.body,
                        },
                    );
                }
            }
        }
    }

    pub fn finish(self) -> (DocTree, Vec<SyncError>) {
        tracing::info!(
            "aggregated {} nodes, {} parse diagnostics",
            self.tree.len().saturating_sub(1),
            self.diagnostics.len()
        );
        (self.tree, self.diagnostics)
    }
}
