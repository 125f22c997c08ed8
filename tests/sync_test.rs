//! End-to-end reconciliation tests against the in-memory store.

use docsync_core::{
    remote::{MemoryPageStore, RemoteBlock, RemotePageStore, RichText},
    resolve::MatchStrategy,
    scan::RawComment,
    sync::{SyncOptions, SyncPlanner},
    tree::{DocTree, TreeAggregator},
};
use std::{sync::Arc, time::Duration};
use test_log::test;

fn comment(file: &str, line: usize, text: &str) -> RawComment {
    RawComment {
        file: file.to_string(),
        line,
        text: text.to_string(),
    }
}

/// Build a tree from `(file, line, comment)` tuples, one `add_file` call per
/// distinct file, in tuple order.
fn build_tree(comments: &[(&str, usize, &str)]) -> DocTree {
    let mut aggregator = TreeAggregator::new();
    let mut current_file: Option<&str> = None;
    let mut batch: Vec<RawComment> = Vec::new();
    for (file, line, text) in comments {
        if current_file.is_some() && current_file != Some(*file) {
            aggregator.add_file(&batch);
            batch.clear();
        }
        current_file = Some(*file);
        batch.push(comment(file, *line, text));
    }
    if !batch.is_empty() {
        aggregator.add_file(&batch);
    }
    let (tree, diagnostics) = aggregator.finish();
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    tree
}

fn two_file_tree() -> DocTree {
    build_tree(&[
        ("hello.kt", 1, "DOCS.App\nSays hello"),
        ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\n- item2"),
    ])
}

/// Sequential planner so creation order (and thus sibling order in the
/// store) is deterministic for assertions.
fn planner(store: &Arc<MemoryPageStore>) -> SyncPlanner {
    SyncPlanner::new(
        store.clone(),
        MatchStrategy::TitleOnly,
        SyncOptions::default(),
    )
    .with_limits(1, Duration::from_secs(5))
}

#[test(tokio::test)]
async fn first_sync_creates_then_rerun_is_noop() {
    let store = Arc::new(MemoryPageStore::new("root"));

    let report = planner(&store).sync(two_file_tree()).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.created, 2);
    assert_eq!(report.operations(), 2);

    // Parent before child: App exists under root, Funcs under App.
    assert_eq!(store.child_titles("root"), vec!["App"]);
    let app_blocks = store.blocks_by_title("App").unwrap();
    assert_eq!(
        app_blocks,
        vec![RemoteBlock::Paragraph {
            rich_text: vec![RichText::plain("Says hello")],
        }]
    );
    let funcs_blocks = store.blocks_by_title("Funcs").unwrap();
    assert_eq!(funcs_blocks.len(), 2);
    assert!(matches!(funcs_blocks[0], RemoteBlock::BulletItem { .. }));

    // A rerun over converged state is a pure no-op.
    let rerun = planner(&store).sync(two_file_tree()).await.unwrap();
    assert!(rerun.is_clean());
    assert_eq!(rerun.operations(), 0);
    assert_eq!(rerun.unchanged, 2);
}

#[test(tokio::test)]
async fn child_edit_updates_child_and_refreshes_ancestor_hashes() {
    let store = Arc::new(MemoryPageStore::new("root"));
    planner(&store).sync(two_file_tree()).await.unwrap();

    let edited = build_tree(&[
        ("hello.kt", 1, "DOCS.App\nSays hello"),
        ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\n- item2\n- item3"),
    ]);
    let report = planner(&store).sync(edited).await.unwrap();
    assert!(report.is_clean());
    // The edited leaf pushes content; its parent only refreshes hashes.
    assert_eq!(report.updated, 1);
    assert_eq!(report.hashes_refreshed, 1);
    assert_eq!(report.unchanged, 0);
    assert_eq!(store.blocks_by_title("Funcs").unwrap().len(), 3);

    let rerun = planner(&store)
        .sync(build_tree(&[
            ("hello.kt", 1, "DOCS.App\nSays hello"),
            ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\n- item2\n- item3"),
        ]))
        .await
        .unwrap();
    assert_eq!(rerun.operations(), 0);
}

#[test(tokio::test)]
async fn whitespace_only_edits_do_not_write() {
    let store = Arc::new(MemoryPageStore::new("root"));
    planner(&store).sync(two_file_tree()).await.unwrap();

    let trailing_ws = build_tree(&[
        ("hello.kt", 1, "DOCS.App\nSays hello   "),
        ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\r\n- item2"),
    ]);
    let report = planner(&store).sync(trailing_ws).await.unwrap();
    assert_eq!(report.operations(), 0);
    assert_eq!(report.unchanged, 2);
}

#[test(tokio::test)]
async fn force_update_rewrites_converged_pages() {
    let store = Arc::new(MemoryPageStore::new("root"));
    planner(&store).sync(two_file_tree()).await.unwrap();

    let force = SyncPlanner::new(
        store.clone(),
        MatchStrategy::TitleOnly,
        SyncOptions {
            force_update: true,
            dry_run: false,
        },
    );
    let report = force.sync(two_file_tree()).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.updated, 2);
    assert_eq!(report.unchanged, 0);
}

#[test(tokio::test)]
async fn dry_run_plans_without_writing() {
    let store = Arc::new(MemoryPageStore::new("root"));
    let dry = SyncPlanner::new(
        store.clone(),
        MatchStrategy::TitleOnly,
        SyncOptions {
            force_update: false,
            dry_run: true,
        },
    );
    let report = dry.sync(two_file_tree()).await.unwrap();
    assert_eq!(report.created, 2);
    // Only the preexisting root page is in the store.
    assert_eq!(store.page_count(), 1);
}

#[test(tokio::test)]
async fn failure_skips_subtree_but_not_siblings_and_retries_next_run() {
    let store = Arc::new(MemoryPageStore::new("root"));
    store.poison_title("App");

    let tree = build_tree(&[
        ("hello.kt", 1, "DOCS.App\nSays hello"),
        ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\n- item2"),
        ("other.kt", 1, "DOCS.Other\nindependent"),
    ]);
    // Default planner: top-level subtrees run on the worker pool.
    let concurrent = SyncPlanner::new(
        store.clone(),
        MatchStrategy::TitleOnly,
        SyncOptions::default(),
    );
    let report = concurrent.sync(tree).await.unwrap();

    // App failed, its subtree was skipped, the independent sibling landed.
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.subtrees_skipped, 1);
    assert_eq!(report.created, 1);
    assert!(store.blocks_by_title("Other").is_some());
    assert!(store.blocks_by_title("App").is_none());
    assert!(store.blocks_by_title("Funcs").is_none());

    // Nothing was recorded for the failed node, so the next run retries
    // exactly that subtree.
    store.heal_title("App");
    let retry = planner(&store)
        .sync(build_tree(&[
            ("hello.kt", 1, "DOCS.App\nSays hello"),
            ("funcs.kt", 1, "DOCS.App.Funcs#2\n- item1\n- item2"),
            ("other.kt", 1, "DOCS.Other\nindependent"),
        ]))
        .await
        .unwrap();
    assert!(retry.is_clean());
    assert_eq!(retry.created, 2);
    assert_eq!(retry.unchanged, 1);
}

#[test(tokio::test)]
async fn sort_index_change_reorders_existing_siblings() {
    let store = Arc::new(MemoryPageStore::new("root"));
    let initial = build_tree(&[
        ("a.kt", 1, "DOCS.Alpha\na"),
        ("b.kt", 1, "DOCS.Beta\nb"),
        ("c.kt", 1, "DOCS.Gamma\nc"),
    ]);
    planner(&store).sync(initial).await.unwrap();
    assert_eq!(store.child_titles("root"), vec!["Alpha", "Beta", "Gamma"]);

    // Gamma moves to the front; the others keep their relative order.
    let reordered = build_tree(&[
        ("a.kt", 1, "DOCS.Alpha\na"),
        ("b.kt", 1, "DOCS.Beta\nb"),
        ("c.kt", 1, "DOCS.Gamma#1\nc"),
    ]);
    let report = planner(&store).sync(reordered).await.unwrap();
    assert!(report.is_clean());
    assert!(report.reordered >= 1);
    assert_eq!(store.child_titles("root"), vec!["Gamma", "Alpha", "Beta"]);
    // Gamma's content changed hash? No: the sort index is not content.
    assert_eq!(report.updated, 0);
}

#[test(tokio::test)]
async fn ambiguous_matches_are_surfaced_not_picked() {
    let store = Arc::new(MemoryPageStore::new("root"));
    store
        .create_page("root", "ALP One", &[], "t", "s")
        .await
        .unwrap();
    store
        .create_page("root", "ALP Two", &[], "t", "s")
        .await
        .unwrap();

    let tree = build_tree(&[("a.kt", 1, "DOCS.Alpha Beta Gamma\nbody")]);
    let mnemonic = SyncPlanner::new(
        store.clone(),
        MatchStrategy::Mnemonic,
        SyncOptions::default(),
    );
    let report = mnemonic.sync(tree).await.unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        report.errors[0],
        docsync_core::SyncError::AmbiguousMatch { .. }
    ));
    assert_eq!(report.created, 0);
}

#[test(tokio::test)]
async fn mnemonic_strategy_binds_to_coded_titles() {
    let store = Arc::new(MemoryPageStore::new("root"));
    store
        .create_page("root", "ALP Overview", &[], "stale", "stale")
        .await
        .unwrap();

    let tree = build_tree(&[("a.kt", 1, "DOCS.Alpha Beta Gamma\nbody")]);
    let mnemonic = SyncPlanner::new(
        store.clone(),
        MatchStrategy::Mnemonic,
        SyncOptions::default(),
    );
    let report = mnemonic.sync(tree).await.unwrap();
    assert!(report.is_clean());
    // Bound to the existing page and updated in place, not recreated.
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(store.child_titles("root"), vec!["ALP Overview"]);
}

#[test(tokio::test)]
async fn structural_ancestors_are_created_as_empty_pages() {
    let store = Arc::new(MemoryPageStore::new("root"));
    let tree = build_tree(&[("a.kt", 1, "DOCS.Guide.Install.Linux\nsteps")]);
    let report = planner(&store).sync(tree).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.created, 3);
    assert_eq!(store.blocks_by_title("Guide").unwrap().len(), 0);
    assert_eq!(store.blocks_by_title("Install").unwrap().len(), 0);
    assert_eq!(store.blocks_by_title("Linux").unwrap().len(), 1);
}
