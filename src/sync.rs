//! Remote reconciliation.
//!
//! [`SyncPlanner`] walks the fingerprinted [`DocTree`] top-down against the
//! remote tree, deciding per node between create, content update,
//! fingerprint-only refresh, reorder and no-op, and applies each decision
//! through the abstract [`RemotePageStore`].
//!
//! The walk is parent-before-children within a subtree: a create must
//! complete and return a real remote id before its children's creates are
//! issued. Independent top-level subtrees run concurrently on a bounded
//! worker pool; no cross-subtree ordering exists. Any operation failure is
//! contained to its node — the error is recorded, the node's subtree is
//! skipped for this run, and siblings continue. A skipped node's stored
//! fingerprints stay stale, so the next run retries exactly that node.
//!
//! There is no transactional guarantee across remote calls. Skip-subtree and
//! retry-next-run is the accepted consistency model.

use crate::{
    error::SyncError,
    fingerprint,
    remote::{RemoteNode, RemotePageStore},
    render::render_content,
    resolve::{find_match, MatchStrategy},
    tree::{Breadcrumb, DocTree},
};
use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};

/// Run-level switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Plan every present node as a content update, skipping fingerprint
    /// comparison entirely.
    pub force_update: bool,
    /// Plan and log operations without mutating the remote store. Reads
    /// still happen.
    pub dry_run: bool,
}

/// What the planner decided for one already-existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedOp {
    UpdateContent,
    UpdateHashesOnly,
    NoOp,
}

/// Decide the operation for a node that resolved to an existing remote page.
pub fn decide(
    force_update: bool,
    text_hash: &str,
    subtree_hash: &str,
    remote: &RemoteNode,
) -> PlannedOp {
    if force_update {
        return PlannedOp::UpdateContent;
    }
    let text_matches = remote.text_hash.as_deref() == Some(text_hash);
    let subtree_matches = remote.subtree_hash.as_deref() == Some(subtree_hash);
    match (text_matches, subtree_matches) {
        (true, true) => PlannedOp::NoOp,
        (false, _) => PlannedOp::UpdateContent,
        (true, false) => PlannedOp::UpdateHashesOnly,
    }
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub hashes_refreshed: usize,
    pub reordered: usize,
    pub unchanged: usize,
    /// Subtrees abandoned this run because their node's operation failed.
    pub subtrees_skipped: usize,
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.hashes_refreshed += other.hashes_refreshed;
        self.reordered += other.reordered;
        self.unchanged += other.unchanged;
        self.subtrees_skipped += other.subtrees_skipped;
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Count of mutating operations applied (or planned, in a dry run).
    pub fn operations(&self) -> usize {
        self.created + self.updated + self.hashes_refreshed + self.reordered
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} hash refreshes, {} reordered, {} unchanged, {} errors",
            self.created,
            self.updated,
            self.hashes_refreshed,
            self.reordered,
            self.unchanged,
            self.errors.len()
        )
    }
}

struct SyncCtx {
    store: Arc<dyn RemotePageStore>,
    strategy: MatchStrategy,
    options: SyncOptions,
    op_timeout: Duration,
    concurrency: usize,
}

impl SyncCtx {
    /// Run one remote call under the per-operation timeout. A timeout is the
    /// operation's own failure, never a global abort.
    async fn op<T>(
        &self,
        path: &Breadcrumb,
        what: &str,
        fut: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        match timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(SyncError::Remote {
                path: path.to_string(),
                reason: format!("{what} timed out after {:?}", self.op_timeout),
            }),
        }
    }
}

/// Diffs the local tree against the remote tree and applies the result.
pub struct SyncPlanner {
    ctx: Arc<SyncCtx>,
}

impl SyncPlanner {
    pub fn new(
        store: Arc<dyn RemotePageStore>,
        strategy: MatchStrategy,
        options: SyncOptions,
    ) -> Self {
        SyncPlanner {
            ctx: Arc::new(SyncCtx {
                store,
                strategy,
                options,
                op_timeout: Duration::from_secs(30),
                concurrency: 4,
            }),
        }
    }

    /// Override the worker pool width and per-operation timeout.
    pub fn with_limits(self, concurrency: usize, op_timeout: Duration) -> Self {
        let ctx = self.ctx;
        SyncPlanner {
            ctx: Arc::new(SyncCtx {
                store: ctx.store.clone(),
                strategy: ctx.strategy,
                options: ctx.options,
                op_timeout,
                concurrency: concurrency.max(1),
            }),
        }
    }

    /// Reconcile the tree against the remote store.
    ///
    /// Fingerprints are (re)computed here, so callers may pass a tree fresh
    /// from aggregation. Only a root resolution failure is fatal; everything
    /// downstream is contained per node and reported.
    pub async fn sync(&self, mut tree: DocTree) -> Result<SyncReport, SyncError> {
        fingerprint::annotate(&mut tree);
        let tree = Arc::new(tree);
        let root_path = Breadcrumb::root();
        let root_remote = self
            .ctx
            .op(&root_path, "resolve root", self.ctx.store.root())
            .await?;
        tracing::info!(
            "sync start: {} nodes against root {}",
            tree.len().saturating_sub(1),
            root_remote.id
        );
        let report = sync_children(
            self.ctx.clone(),
            tree,
            root_path,
            root_remote.id,
            false,
            true,
        )
        .await;
        tracing::info!("sync finished: {report}");
        Ok(report)
    }
}

type NodeFuture = Pin<Box<dyn Future<Output = SyncReport> + Send>>;

/// Sync one node given its parent's remote id and its own resolution, then
/// descend into its children.
fn process_node(
    ctx: Arc<SyncCtx>,
    tree: Arc<DocTree>,
    path: Breadcrumb,
    parent_id: String,
    resolved: Option<RemoteNode>,
) -> NodeFuture {
    Box::pin(async move {
        let mut report = SyncReport::default();
        let Some(node) = tree.get(&path) else {
            return report;
        };
        let text_hash = node.text_hash.clone().unwrap_or_default();
        let subtree_hash = node.subtree_hash.clone().unwrap_or_default();

        let (remote_id, created) = match resolved {
            None => {
                let title = path.leaf().unwrap_or_default().to_string();
                let blocks = render_content(&node.content());
                if ctx.options.dry_run {
                    tracing::info!("[dry run] would create '{path}' under {parent_id}");
                    report.created += 1;
                    (format!("planned:{path}"), true)
                } else {
                    let create = ctx.store.create_page(
                        &parent_id,
                        &title,
                        &blocks,
                        &text_hash,
                        &subtree_hash,
                    );
                    match ctx.op(&path, "create page", create).await {
                        Ok(id) => {
                            tracing::info!("created '{path}' as {id}");
                            report.created += 1;
                            (id, true)
                        }
                        Err(err) => {
                            tracing::warn!("{err}");
                            report.errors.push(err);
                            report.subtrees_skipped += 1;
                            return report;
                        }
                    }
                }
            }
            Some(remote) => {
                let op = decide(ctx.options.force_update, &text_hash, &subtree_hash, &remote);
                let applied = match op {
                    PlannedOp::NoOp => {
                        tracing::debug!("'{path}' unchanged");
                        report.unchanged += 1;
                        Ok(())
                    }
                    PlannedOp::UpdateContent => {
                        let blocks = render_content(&node.content());
                        if ctx.options.dry_run {
                            tracing::info!("[dry run] would update content of '{path}'");
                            report.updated += 1;
                            Ok(())
                        } else {
                            let update = ctx.store.update_page(
                                &remote.id,
                                &blocks,
                                &text_hash,
                                &subtree_hash,
                            );
                            ctx.op(&path, "update page", update).await.inspect(|_| {
                                tracing::info!("updated content of '{path}'");
                                report.updated += 1;
                            })
                        }
                    }
                    PlannedOp::UpdateHashesOnly => {
                        if ctx.options.dry_run {
                            tracing::info!("[dry run] would refresh fingerprints of '{path}'");
                            report.hashes_refreshed += 1;
                            Ok(())
                        } else {
                            let update = ctx.store.update_hashes(
                                &remote.id,
                                &text_hash,
                                &subtree_hash,
                            );
                            ctx.op(&path, "update hashes", update).await.inspect(|_| {
                                tracing::debug!("refreshed fingerprints of '{path}'");
                                report.hashes_refreshed += 1;
                            })
                        }
                    }
                };
                if let Err(err) = applied {
                    tracing::warn!("{err}");
                    report.errors.push(err);
                    report.subtrees_skipped += 1;
                    return report;
                }
                (remote.id, false)
            }
        };

        let child_report =
            sync_children(ctx, tree.clone(), path, remote_id, created, false).await;
        report.merge(child_report);
        report
    })
}

/// Resolve, reorder and recurse into the children of one synced node.
///
/// `parent_created` means the parent did not exist remotely before this run,
/// so its children are known absent and no listing is fetched. `concurrent`
/// fans the children out on the worker pool (used for top-level subtrees).
fn sync_children(
    ctx: Arc<SyncCtx>,
    tree: Arc<DocTree>,
    parent_path: Breadcrumb,
    parent_id: String,
    parent_created: bool,
    concurrent: bool,
) -> NodeFuture {
    Box::pin(async move {
        let mut report = SyncReport::default();
        let child_paths = tree.sorted_children(&parent_path);
        if child_paths.is_empty() {
            return report;
        }

        let remote_children: Vec<RemoteNode> = if parent_created {
            Vec::new()
        } else {
            match ctx
                .op(
                    &parent_path,
                    "list children",
                    ctx.store.children(&parent_id),
                )
                .await
            {
                Ok(children) => children,
                Err(err) => {
                    tracing::warn!("{err}");
                    report.errors.push(err);
                    report.subtrees_skipped += child_paths.len();
                    return report;
                }
            }
        };

        // Resolve every child against the one listing; ambiguity fails only
        // the child it concerns.
        let mut work: Vec<(Breadcrumb, Option<RemoteNode>)> = Vec::new();
        for child_path in child_paths {
            match find_match(ctx.strategy, &child_path, &remote_children) {
                Ok(resolved) => work.push((child_path, resolved.cloned())),
                Err(err) => {
                    tracing::warn!("{err}");
                    report.errors.push(err);
                    report.subtrees_skipped += 1;
                }
            }
        }

        // Reorder pass over the children that already exist remotely: walk
        // the desired order, repositioning against a local model of the
        // remote order so each move sees the previous moves applied.
        let desired: Vec<(Breadcrumb, String)> = work
            .iter()
            .filter_map(|(path, resolved)| {
                resolved.as_ref().map(|r| (path.clone(), r.id.clone()))
            })
            .collect();
        let mut current: Vec<String> = remote_children
            .iter()
            .map(|r| r.id.clone())
            .filter(|id| desired.iter().any(|(_path, want)| want == id))
            .collect();
        let mut failed_moves: Vec<String> = Vec::new();
        for (position, (child_path, id)) in desired.iter().enumerate() {
            if current.get(position) == Some(id) {
                continue;
            }
            let after = if position == 0 {
                None
            } else {
                desired.get(position - 1).map(|(_path, prev)| prev.clone())
            };
            if ctx.options.dry_run {
                tracing::info!("[dry run] would move '{child_path}' after {after:?}");
                report.reordered += 1;
            } else {
                let mv = ctx.store.move_page(id, after.as_deref());
                match ctx.op(child_path, "move page", mv).await {
                    Ok(()) => {
                        tracing::info!("moved '{child_path}' after {after:?}");
                        report.reordered += 1;
                    }
                    Err(err) => {
                        tracing::warn!("{err}");
                        report.errors.push(err);
                        report.subtrees_skipped += 1;
                        failed_moves.push(id.clone());
                        continue;
                    }
                }
            }
            current.retain(|existing| existing != id);
            let insert_at = match &after {
                None => 0,
                Some(prev) => {
                    current
                        .iter()
                        .position(|existing| existing == prev)
                        .map(|idx| idx + 1)
                        .unwrap_or(position.min(current.len()))
                }
            };
            current.insert(insert_at.min(current.len()), id.clone());
        }
        let work: Vec<(Breadcrumb, Option<RemoteNode>)> = work
            .into_iter()
            .filter(|(_path, resolved)| match resolved {
                Some(remote) => !failed_moves.contains(&remote.id),
                None => true,
            })
            .collect();

        if concurrent {
            let semaphore = Arc::new(Semaphore::new(ctx.concurrency));
            let mut tasks = JoinSet::new();
            for (child_path, resolved) in work {
                let ctx = ctx.clone();
                let tree = tree.clone();
                let parent_id = parent_id.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    process_node(ctx, tree, child_path, parent_id, resolved).await
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(child_report) => report.merge(child_report),
                    Err(err) => report.errors.push(SyncError::Remote {
                        path: parent_path.to_string(),
                        reason: format!("subtree task failed: {err}"),
                    }),
                }
            }
        } else {
            for (child_path, resolved) in work {
                let child_report = process_node(
                    ctx.clone(),
                    tree.clone(),
                    child_path,
                    parent_id.clone(),
                    resolved,
                )
                .await;
                report.merge(child_report);
            }
        }
        report
    })
}
