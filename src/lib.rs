//! # docsync-core
//!
//! Extracts tagged block comments from source trees, assembles them into a
//! hierarchical document tree, and reconciles that tree against a remote
//! hierarchical-page store, updating only what changed.
//!
//! ## Overview
//!
//! Source files carry block comments opening with a tag line such as
//! `DOCS.App.Funcs#2`. Each tagged comment contributes a markdown fragment
//! to the page named by its breadcrumb. A run rebuilds the whole tree from
//! scratch, fingerprints it, and diffs it against the remote store using two
//! persisted hash properties per page — so an unchanged page costs nothing
//! beyond a listing, and a rerun over converged state is a pure no-op.
//!
//! ## Pipeline
//!
//! - [`scan`]: file discovery and block-comment lexing
//! - [`codec`]: comment normalization and tag grammar parsing
//! - [`tree`]: aggregation into the canonical [`tree::DocTree`]
//! - [`fingerprint`]: bottom-up content and subtree hashing
//! - [`resolve`]: remote name matching (`title_only`, `prefix`, `mnemonic`)
//! - [`sync`]: operation planning and execution with per-node failure
//!   containment
//! - [`remote`]: the abstract [`remote::RemotePageStore`] capability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsync_core::{
//!     commands,
//!     config::SyncConfig,
//!     remote::MemoryPageStore,
//!     sync::SyncOptions,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), docsync_core::SyncError> {
//!     let config = SyncConfig::load("docsync.toml")?;
//!     let store = Arc::new(MemoryPageStore::new(config.root_page_id.clone()));
//!     let report = commands::sync(&config, store, SyncOptions::default()).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency model
//!
//! Reconciliation is read-then-write against an external service with no
//! transaction spanning calls. A failed operation leaves its node's stored
//! fingerprints stale and skips that subtree; the next run retries exactly
//! the stale nodes. Remote-side edits are overwritten by the next local run,
//! and remote-only content is not preserved.

pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod remote;
pub mod render;
pub mod resolve;
pub mod scan;
pub mod sync;
pub mod tree;

#[cfg(feature = "service")]
pub mod client;

#[cfg(test)]
mod tests;

pub use error::*;
