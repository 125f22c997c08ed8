use crate::{error::SyncError, resolve::MatchStrategy};
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

/// Environment variable holding the remote API token. Kept out of the config
/// file so the file can be committed alongside the sources it describes.
pub const TOKEN_ENV_VAR: &str = "DOCSYNC_API_TOKEN";

/// Config file names probed when a directory is given instead of a file.
pub const CONFIG_NAMES: [&str; 2] = ["docsync.toml", ".docsync.toml"];

fn default_extensions() -> Vec<String> {
    ["java", "kt", "kts", "md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

/// Run configuration, deserialized from `docsync.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory scanned for tagged source files.
    pub root: PathBuf,
    /// Remote page id the document tree is anchored under.
    pub root_page_id: String,
    /// Name-matching policy used when resolving local nodes remotely.
    #[serde(default)]
    pub match_strategy: MatchStrategy,
    /// File extensions included in the scan, without leading dots.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Maximum number of top-level subtrees synced concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per remote operation timeout. A timeout counts as that operation's
    /// own failure, never a global abort.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SyncConfig {
    /// Load configuration from a file, or probe [`CONFIG_NAMES`] when given a
    /// directory.
    pub fn load(path_or_dir: impl AsRef<Path>) -> Result<Self, SyncError> {
        let candidate = path_or_dir.as_ref();
        tracing::debug!("Loading config from {:?}", candidate);
        let path = if candidate.is_dir() {
            CONFIG_NAMES
                .iter()
                .map(|name| candidate.join(name))
                .find(|p| p.exists())
                .ok_or_else(|| {
                    SyncError::Config(format!(
                        "no config found in {:?}; create one of: {}",
                        candidate,
                        CONFIG_NAMES.join(", ")
                    ))
                })?
        } else {
            candidate.to_path_buf()
        };
        let content = read_to_string(&path)?;
        let config: SyncConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.root.as_os_str().is_empty() {
            return Err(SyncError::Config("'root' must be a non-empty path".into()));
        }
        if self.root_page_id.trim().is_empty() {
            return Err(SyncError::Config(
                "'root_page_id' must be a non-empty string".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(SyncError::Config("'concurrency' must be at least 1".into()));
        }
        Ok(())
    }

    /// Read the remote API token from the environment. Only the `service`
    /// store needs it; library consumers supplying their own store never
    /// call this.
    pub fn api_token() -> Result<String, SyncError> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                SyncError::Config(format!("environment variable {TOKEN_ENV_VAR} must be set"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_probes_directory_for_config_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("docsync.toml"),
            "root = \"src\"\nroot_page_id = \"abc123\"\n",
        )
        .unwrap();
        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.root, PathBuf::from("src"));
        assert_eq!(config.root_page_id, "abc123");
        assert_eq!(config.match_strategy, MatchStrategy::TitleOnly);
        assert_eq!(config.concurrency, 4);
        assert!(config.extensions.iter().any(|e| e == "kt"));
    }

    #[test]
    fn load_rejects_blank_root_page_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docsync.toml");
        std::fs::write(&path, "root = \"src\"\nroot_page_id = \"  \"\n").unwrap();
        assert!(matches!(
            SyncConfig::load(&path),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_config_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SyncConfig::load(dir.path()),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn match_strategy_parses_from_snake_case() {
        let config: SyncConfig = toml::from_str(
            "root = \"src\"\nroot_page_id = \"abc\"\nmatch_strategy = \"mnemonic\"\n",
        )
        .unwrap();
        assert_eq!(config.match_strategy, MatchStrategy::Mnemonic);
    }
}
