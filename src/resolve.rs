//! Remote path resolution.
//!
//! Each local node is matched against its parent's remote children by its
//! final path segment, under one of three name-matching policies. Absence is
//! a normal outcome (it drives page creation); matching more than one child
//! is an error that must be surfaced, never silently tie-broken.

use crate::{
    error::SyncError,
    remote::{RemoteNode, RemotePageStore},
    tree::Breadcrumb,
};
use serde::{Deserialize, Serialize};

/// Name-matching policy for resolving a local segment to a remote title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Case-insensitive exact title equality.
    #[default]
    TitleOnly,
    /// Exact match, or the remote title starts with the segment after both
    /// are stripped of non-alphanumeric characters and lowercased.
    Prefix,
    /// Exact match, or the remote title starts with the segment's
    /// three-character mnemonic code.
    Mnemonic,
}

/// Deterministic 3-character uppercase code for a title.
///
/// The first alphanumeric character, then up to two consonants scanned
/// left-to-right from the remainder, then vowels at still-unconsumed
/// positions, then any remaining character (digits included), padded with
/// `X`. Titles with no alphanumeric characters at all code to `XXX`.
pub fn mnemonic(title: &str) -> String {
    const VOWELS: [char; 5] = ['A', 'E', 'I', 'O', 'U'];
    let chars: Vec<char> = title.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let Some((&first, pool)) = chars.split_first() else {
        return "XXX".to_string();
    };
    let mut code = vec![first.to_ascii_uppercase()];
    let mut consumed = vec![false; pool.len()];
    for (i, c) in pool.iter().enumerate() {
        if code.len() >= 3 {
            break;
        }
        if c.is_ascii_alphabetic() && !VOWELS.contains(&c.to_ascii_uppercase()) {
            code.push(c.to_ascii_uppercase());
            consumed[i] = true;
        }
    }
    if code.len() < 3 {
        for (i, c) in pool.iter().enumerate() {
            if code.len() >= 3 {
                break;
            }
            if !consumed[i] && VOWELS.contains(&c.to_ascii_uppercase()) {
                code.push(c.to_ascii_uppercase());
                consumed[i] = true;
            }
        }
    }
    if code.len() < 3 {
        for (i, c) in pool.iter().enumerate() {
            if code.len() >= 3 {
                break;
            }
            if !consumed[i] {
                code.push(c.to_ascii_uppercase());
                consumed[i] = true;
            }
        }
    }
    while code.len() < 3 {
        code.push('X');
    }
    code.into_iter().collect()
}

fn exact(segment: &str, title: &str) -> bool {
    segment.to_lowercase() == title.to_lowercase()
}

fn normalize_alnum(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Whether `title` matches `segment` under `strategy`.
pub fn title_matches(strategy: MatchStrategy, segment: &str, title: &str) -> bool {
    match strategy {
        MatchStrategy::TitleOnly => exact(segment, title),
        MatchStrategy::Prefix => {
            if exact(segment, title) {
                return true;
            }
            let needle = normalize_alnum(segment);
            !needle.is_empty() && normalize_alnum(title).starts_with(&needle)
        }
        MatchStrategy::Mnemonic => {
            exact(segment, title) || title.to_uppercase().starts_with(&mnemonic(segment))
        }
    }
}

/// Search `children` for the unique match of `path`'s final segment.
///
/// `Ok(None)` when nothing matches; [`SyncError::AmbiguousMatch`] when more
/// than one child does.
pub fn find_match<'r>(
    strategy: MatchStrategy,
    path: &Breadcrumb,
    children: &'r [RemoteNode],
) -> Result<Option<&'r RemoteNode>, SyncError> {
    let Some(segment) = path.leaf() else {
        return Ok(None);
    };
    let matches: Vec<&RemoteNode> = children
        .iter()
        .filter(|child| title_matches(strategy, segment, &child.title))
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(SyncError::AmbiguousMatch {
            path: path.to_string(),
            segment: segment.to_string(),
            titles: many.iter().map(|m| m.title.clone()).collect(),
        }),
    }
}

/// Resolves local tree paths onto the remote tree, one parent at a time.
/// Callers thread the already-resolved parent down the walk so each node
/// costs a single children listing.
pub struct PathResolver<'a> {
    store: &'a dyn RemotePageStore,
    strategy: MatchStrategy,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a dyn RemotePageStore, strategy: MatchStrategy) -> Self {
        PathResolver { store, strategy }
    }

    /// The remote node the local tree root maps onto.
    pub async fn resolve_root(&self) -> Result<RemoteNode, SyncError> {
        self.store.root().await
    }

    /// Resolve one child of an already-resolved parent.
    pub async fn resolve_child(
        &self,
        parent_id: &str,
        path: &Breadcrumb,
    ) -> Result<Option<RemoteNode>, SyncError> {
        let children = self.store.children(parent_id).await?;
        let resolved = find_match(self.strategy, path, &children)?.cloned();
        tracing::debug!(
            "resolve '{path}' under {parent_id}: {}",
            resolved
                .as_ref()
                .map(|r| r.id.as_str())
                .unwrap_or("absent")
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, title: &str) -> RemoteNode {
        RemoteNode {
            id: id.to_string(),
            title: title.to_string(),
            text_hash: None,
            subtree_hash: None,
            parent_id: None,
        }
    }

    #[test]
    fn mnemonic_known_codes() {
        assert_eq!(mnemonic(""), "XXX");
        assert_eq!(mnemonic("!!!"), "XXX");
        assert_eq!(mnemonic("Alpha Beta Gamma"), "ALP");
        assert_eq!(mnemonic("Echo"), "ECH");
        assert_eq!(mnemonic("why"), "WHY");
        assert_eq!(mnemonic("Idea 123"), "IDE");
        assert_eq!(mnemonic("A1"), "A1X");
        assert_eq!(mnemonic("C# Sharp Developer"), "CSH");
        assert_eq!(mnemonic("123abc"), "1BC");
    }

    #[test]
    fn mnemonic_prefers_vowels_over_digits() {
        // Consonant pass finds none, vowel pass runs before the catch-all.
        assert_eq!(mnemonic("B1e"), "BE1");
    }

    #[test]
    fn title_only_is_case_insensitive_equality() {
        assert!(title_matches(MatchStrategy::TitleOnly, "Alpha", "alpha"));
        assert!(!title_matches(MatchStrategy::TitleOnly, "Alpha", "alpha docs"));
    }

    #[test]
    fn prefix_ignores_symbols_and_case() {
        assert!(title_matches(MatchStrategy::Prefix, "API", "A.P.I. Reference"));
        assert!(title_matches(MatchStrategy::Prefix, "Alpha", "alpha-notes"));
        assert!(!title_matches(MatchStrategy::Prefix, "Beta", "Alpha Beta"));
    }

    #[test]
    fn mnemonic_strategy_matches_coded_titles() {
        assert!(title_matches(MatchStrategy::Mnemonic, "Alpha Beta Gamma", "ALP-7 Overview"));
        assert!(title_matches(MatchStrategy::Mnemonic, "Echo", "echo"));
        assert!(!title_matches(MatchStrategy::Mnemonic, "Echo", "ACH Transfers"));
    }

    #[test]
    fn ambiguity_is_an_error_not_a_pick() {
        let children = vec![remote("1", "ALP One"), remote("2", "alp two")];
        let path = Breadcrumb::from_segments(vec!["Alpha Beta Gamma".into()]);
        let err = find_match(MatchStrategy::Mnemonic, &path, &children).unwrap_err();
        match err {
            SyncError::AmbiguousMatch { titles, .. } => assert_eq!(titles.len(), 2),
            other => panic!("expected AmbiguousMatch, got {other:?}"),
        }
    }

    #[test]
    fn absence_is_a_normal_outcome() {
        let children = vec![remote("1", "Unrelated")];
        let path = Breadcrumb::from_segments(vec!["Alpha".into()]);
        assert!(find_match(MatchStrategy::TitleOnly, &path, &children)
            .unwrap()
            .is_none());
    }
}
