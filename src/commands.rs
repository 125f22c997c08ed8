//! High-level entry points tying the stages together.

use crate::{
    config::SyncConfig,
    error::SyncError,
    fingerprint,
    remote::RemotePageStore,
    scan::FileScanner,
    sync::{SyncOptions, SyncPlanner, SyncReport},
    tree::{DocTree, TreeAggregator},
};
use std::{sync::Arc, time::Duration};

/// Outcome of the extraction stages: the fingerprinted tree plus the parse
/// diagnostics collected along the way.
#[derive(Debug)]
pub struct ExtractReport {
    pub tree: DocTree,
    pub diagnostics: Vec<SyncError>,
}

/// Scan, aggregate and fingerprint. The whole tree is rebuilt from scratch;
/// no local state persists across runs.
pub fn extract(config: &SyncConfig) -> Result<ExtractReport, SyncError> {
    let scanner = FileScanner::new(&config.root, config.extensions.clone());
    let files = scanner.scan()?;
    let mut aggregator = TreeAggregator::new();
    for file in &files {
        aggregator.add_file(&file.comments);
    }
    let (mut tree, diagnostics) = aggregator.finish();
    fingerprint::annotate(&mut tree);
    for diagnostic in &diagnostics {
        tracing::warn!("parse diagnostic: {diagnostic}");
    }
    Ok(ExtractReport { tree, diagnostics })
}

/// Run a full sync: extract, then reconcile against `store`.
///
/// Parse diagnostics are carried into the report's error list so one exit
/// path surfaces everything that went wrong this run.
pub async fn sync(
    config: &SyncConfig,
    store: Arc<dyn RemotePageStore>,
    options: SyncOptions,
) -> Result<SyncReport, SyncError> {
    let extract_report = extract(config)?;
    if extract_report.tree.is_empty() {
        tracing::info!("no tagged comments found; nothing to sync");
        return Ok(SyncReport {
            errors: extract_report.diagnostics,
            ..SyncReport::default()
        });
    }
    let planner = SyncPlanner::new(store, config.match_strategy, options).with_limits(
        config.concurrency,
        Duration::from_secs(config.timeout_secs),
    );
    let mut report = planner.sync(extract_report.tree).await?;
    report.errors.extend(extract_report.diagnostics);
    Ok(report)
}
