//! docsync CLI tool
//!
//! Command-line interface for extracting tagged comments and syncing them to
//! the remote page store.
//!
//! ## Commands
//!
//! - `extract <root>`: scan and print the aggregated document tree
//! - `sync`: reconcile the tree against the remote store

use clap::{Parser, Subcommand};
use docsync_core::{
    client::NotionStore,
    commands,
    config::SyncConfig,
    sync::SyncOptions,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about = "Sync tagged source comments to a hierarchical page store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory once and print the aggregated document tree
    Extract {
        /// Root directory to scan
        root: PathBuf,

        /// Output the tree as JSON
        #[arg(long)]
        json: bool,

        /// File extensions to include (e.g. kt kts java)
        #[arg(long)]
        ext: Vec<String>,
    },

    /// Reconcile the document tree against the remote store
    Sync {
        /// Configuration file or directory containing docsync.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,

        /// Update every page regardless of fingerprint comparison
        #[arg(long)]
        force: bool,

        /// Plan and log operations without touching the remote
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { root, json, ext } => {
            let mut config = SyncConfig {
                root,
                root_page_id: "unused".to_string(),
                match_strategy: Default::default(),
                extensions: if ext.is_empty() {
                    vec![
                        "java".to_string(),
                        "kt".to_string(),
                        "kts".to_string(),
                        "md".to_string(),
                    ]
                } else {
                    ext
                },
                concurrency: 1,
                timeout_secs: 30,
            };
            config.extensions = config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();

            let report = commands::extract(&config)?;
            if json {
                let nodes: Vec<_> = report
                    .tree
                    .iter()
                    .filter(|(path, _node)| !path.is_root())
                    .map(|(_path, node)| node)
                    .collect();
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else {
                for (path, node) in report.tree.iter() {
                    if path.is_root() {
                        continue;
                    }
                    println!("{path} (sort {})", node.sort_index);
                    for fragment in node.canonical_fragments() {
                        println!(
                            "  {}:{} ({} bytes)",
                            fragment.source_file,
                            fragment.source_line,
                            fragment.body.len()
                        );
                    }
                }
            }
            for diagnostic in &report.diagnostics {
                eprintln!("warning: {diagnostic}");
            }
            Ok(())
        }

        Commands::Sync {
            config,
            force,
            dry_run,
        } => {
            let config = SyncConfig::load(&config)?;
            let token = SyncConfig::api_token()?;
            let store = Arc::new(NotionStore::new(token, config.root_page_id.clone())?);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let report = runtime.block_on(commands::sync(
                &config,
                store,
                SyncOptions {
                    force_update: force,
                    dry_run,
                },
            ))?;

            println!("{report}");
            for error in &report.errors {
                eprintln!("error: {error}");
            }
            if report.is_clean() {
                Ok(())
            } else {
                Err(format!("{} nodes failed; rerun will retry them", report.errors.len()).into())
            }
        }
    }
}
