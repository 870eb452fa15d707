//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use phonotest_core::auth::SharedSecret;
use phonotest_core::experiment::{DuplicatePolicy, ExperimentConfig};
use phonotest_core::traits::ResponseStore;

use crate::jsonl::JsonlStore;
use crate::memory::MemoryStore;

/// Name of the project-local config file.
pub const CONFIG_FILE_NAME: &str = "phonotest.toml";

/// Where responses are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Jsonl {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Jsonl {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("phonotest-data/responses.jsonl")
}

fn default_trial_sets_dir() -> PathBuf {
    PathBuf::from("trial-sets")
}

/// Top-level phonotest configuration.
///
/// Note: Custom Debug impl masks the secret digest.
#[derive(Clone, Serialize, Deserialize)]
pub struct PhonotestConfig {
    /// Directory holding the four trial-set files.
    #[serde(default = "default_trial_sets_dir")]
    pub trial_sets_dir: PathBuf,
    /// Handling of repeated submissions for the same subject and phase.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// SHA-256 hex digest of the result-download password.
    #[serde(default)]
    pub download_secret_sha256: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for PhonotestConfig {
    fn default() -> Self {
        Self {
            trial_sets_dir: default_trial_sets_dir(),
            duplicate_policy: DuplicatePolicy::default(),
            download_secret_sha256: None,
            store: StoreConfig::default(),
        }
    }
}

impl std::fmt::Debug for PhonotestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhonotestConfig")
            .field("trial_sets_dir", &self.trial_sets_dir)
            .field("duplicate_policy", &self.duplicate_policy)
            .field(
                "download_secret_sha256",
                &self.download_secret_sha256.as_ref().map(|_| "***"),
            )
            .field("store", &self.store)
            .finish()
    }
}

impl PhonotestConfig {
    /// The configured download secret, if any.
    pub fn download_secret(&self) -> Result<Option<SharedSecret>> {
        match self.download_secret_sha256.as_deref() {
            None | Some("") => Ok(None),
            Some(digest) => SharedSecret::from_digest(digest).map(Some).ok_or_else(|| {
                anyhow::anyhow!("download_secret_sha256 must be 64 hex characters")
            }),
        }
    }

    /// Settings for the experiment service.
    pub fn experiment_config(&self) -> Result<ExperimentConfig> {
        Ok(ExperimentConfig {
            duplicate_policy: self.duplicate_policy,
            download_secret: self.download_secret()?,
        })
    }

    /// Resolve `${VAR}` references in every string-valued setting.
    fn resolve_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        self.trial_sets_dir = resolve_path(&self.trial_sets_dir, lookup);
        if let Some(digest) = &self.download_secret_sha256 {
            self.download_secret_sha256 = Some(resolve_env_vars(digest, lookup));
        }
        if let StoreConfig::Jsonl { path } = &mut self.store {
            *path = resolve_path(path, lookup);
        }
    }

    /// Apply `PHONOTEST_SECRET_SHA256` and `PHONOTEST_STORE_PATH`.
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(digest) = lookup("PHONOTEST_SECRET_SHA256") {
            self.download_secret_sha256 = Some(digest);
        }
        if let Some(path) = lookup("PHONOTEST_STORE_PATH") {
            self.store = StoreConfig::Jsonl {
                path: PathBuf::from(path),
            };
        }
    }
}

/// Replace each `${NAME}` in `s` with the looked-up value, or nothing.
///
/// An unterminated `${` is kept as written.
fn resolve_env_vars(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&lookup(&rest[start + 2..start + 2 + len]).unwrap_or_default());
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve_path(path: &Path, lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy(), lookup))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `phonotest.toml` in the current directory
/// 2. `~/.config/phonotest/config.toml`
///
/// Environment variable overrides: `PHONOTEST_SECRET_SHA256`, `PHONOTEST_STORE_PATH`.
pub fn load_config() -> Result<PhonotestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PhonotestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => [Some(PathBuf::from(CONFIG_FILE_NAME)), global_config_path()]
            .into_iter()
            .flatten()
            .find(|p| p.exists()),
    };

    let mut config = match &config_path {
        Some(path) => parse_config_file(path)?,
        None => PhonotestConfig::default(),
    };
    config.apply_overrides(&env_lookup);
    config.resolve_env(&env_lookup);

    tracing::debug!(source = ?config_path, ?config, "loaded configuration");
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<PhonotestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config: {}", path.display()))
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("phonotest")
            .join("config.toml")
    })
}

/// Create a response store from its configuration.
pub fn create_store(config: &StoreConfig) -> Arc<dyn ResponseStore> {
    match config {
        StoreConfig::Jsonl { path } => Arc::new(JsonlStore::new(path)),
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store; responses will not survive this process");
            Arc::new(MemoryStore::new())
        }
    }
}
