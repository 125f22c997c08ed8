//! Content fingerprints.
//!
//! A bottom-up pass annotates every [`DocNode`](crate::tree::DocNode) with
//! two SHA-256 digests: `text_hash` over the node's own canonical content,
//! and `subtree_hash` over its text hash plus its children's subtree hashes
//! in canonical sibling order. The subtree hash is therefore sensitive to
//! content, structural and ordering changes anywhere below a node, which is
//! what lets a rerun decide what to write without re-reading remote content.

use crate::tree::{Breadcrumb, DocTree};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Normalize content for hashing: line endings become `\n` and trailing
/// whitespace is stripped per line, so whitespace-only diffs never trigger
/// remote writes.
pub fn canonicalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex SHA-256 of the canonicalized content.
pub fn text_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(content).as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 over the node's text hash followed by its children's subtree
/// hashes in canonical order. Every segment is length-prefixed with a 64-bit
/// big-endian byte count so concatenation ambiguity cannot make two
/// different structures collide.
pub fn subtree_hash(own_text_hash: &str, child_subtree_hashes: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((own_text_hash.len() as u64).to_be_bytes());
    hasher.update(own_text_hash.as_bytes());
    for child in child_subtree_hashes {
        hasher.update((child.len() as u64).to_be_bytes());
        hasher.update(child.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Annotate the finished tree, post-order.
pub fn annotate(tree: &mut DocTree) {
    let mut annotations: BTreeMap<Breadcrumb, (String, String)> = BTreeMap::new();
    visit(tree, &Breadcrumb::root(), &mut annotations);
    for (path, (text, subtree)) in annotations {
        if let Some(node) = tree.get_mut(&path) {
            node.text_hash = Some(text);
            node.subtree_hash = Some(subtree);
        }
    }
}

fn visit(
    tree: &DocTree,
    path: &Breadcrumb,
    annotations: &mut BTreeMap<Breadcrumb, (String, String)>,
) -> Option<String> {
    let node = tree.get(path)?;
    let mut child_hashes = Vec::new();
    for child in tree.sorted_children(path) {
        if let Some(hash) = visit(tree, &child, annotations) {
            child_hashes.push(hash);
        }
    }
    let text = text_hash(&node.content());
    let subtree = subtree_hash(&text, &child_hashes);
    annotations.insert(path.clone(), (text, subtree.clone()));
    Some(subtree)
}
