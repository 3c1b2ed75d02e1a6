//! `load_config` module: the Configuration Resolver.
//!
//! Resolves a [`RepositoryConfig`] from layered sources behind one
//! [`ConfigSource`] interface, so the upload core never knows where a value
//! came from. Later sources win:
//!
//! 1. built-in defaults
//! 2. the optional YAML file (`--config`), non-secret settings only
//! 3. the environment (`main` loads a `.env` file into it via `dotenvy`)
//! 4. CLI flags
//!
//! The token is only ever taken from the environment.
//!
//! # Errors
//! Unreadable or malformed YAML is reported through `anyhow` with the file
//! path attached. Missing values are *not* an error here: completeness is
//! checked by the batch orchestrator before anything is uploaded.

use anyhow::{Context, Result};
use dataset_push_core::config::{
    DEFAULT_BRANCH, DEFAULT_COMMIT_MESSAGE_TEMPLATE, DEFAULT_UPLOAD_PATH,
};
use dataset_push_core::bulk::{CommitIdentity, DEFAULT_GIT_HOST, DEFAULT_STEP_TIMEOUT};
use dataset_push_core::github::DEFAULT_API_BASE_URL;
use dataset_push_core::RepositoryConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::candidates::SUPPORTED_EXTENSIONS;

/// A single resolvable repository setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Token,
    Owner,
    Repo,
    Branch,
    UploadPath,
    CommitMessageTemplate,
}

impl ConfigKey {
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::Token => "GITHUB_TOKEN",
            ConfigKey::Owner => "REPO_OWNER",
            ConfigKey::Repo => "REPO_NAME",
            ConfigKey::Branch => "BRANCH_NAME",
            ConfigKey::UploadPath => "UPLOAD_PATH",
            ConfigKey::CommitMessageTemplate => "COMMIT_MESSAGE_TEMPLATE",
        }
    }
}

/// Anything that can supply repository settings.
pub trait ConfigSource {
    fn name(&self) -> &'static str;
    fn get(&self, key: ConfigKey) -> Option<String>;
}

pub struct Defaults;

impl ConfigSource for Defaults {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Branch => Some(DEFAULT_BRANCH.to_string()),
            ConfigKey::UploadPath => Some(DEFAULT_UPLOAD_PATH.to_string()),
            ConfigKey::CommitMessageTemplate => Some(DEFAULT_COMMIT_MESSAGE_TEMPLATE.to_string()),
            _ => None,
        }
    }
}

/// Process environment (the secret store).
pub struct Environment;

impl ConfigSource for Environment {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn get(&self, key: ConfigKey) -> Option<String> {
        std::env::var(key.env_var()).ok()
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub upload_path: Option<String>,
    pub commit_message_template: Option<String>,
}

impl ConfigSource for Overrides {
    fn name(&self) -> &'static str {
        "command line"
    }

    fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Token => None,
            ConfigKey::Owner => self.owner.clone(),
            ConfigKey::Repo => self.repo.clone(),
            ConfigKey::Branch => self.branch.clone(),
            ConfigKey::UploadPath => self.upload_path.clone(),
            ConfigKey::CommitMessageTemplate => self.commit_message_template.clone(),
        }
    }
}

/// Tuning settings that only come from the YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub threshold_mb: u64,
    pub max_concurrent_uploads: usize,
    pub max_concurrent_bulk_transfers: usize,
    pub api_base_url: String,
    pub git_host: String,
    pub allowed_extensions: Vec<String>,
    /// Author of Git LFS commits.
    pub commit_author_name: String,
    pub commit_author_email: String,
    /// Per git step, in seconds.
    pub step_timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        let identity = CommitIdentity::default();
        Self {
            threshold_mb: 25,
            max_concurrent_uploads: 1,
            max_concurrent_bulk_transfers: 1,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            allowed_extensions: SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            commit_author_name: identity.name,
            commit_author_email: identity.email,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT.as_secs(),
        }
    }
}

impl UploadSettings {
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_mb.saturating_mul(1024 * 1024)
    }

    pub fn commit_identity(&self) -> CommitIdentity {
        CommitIdentity {
            name: self.commit_author_name.clone(),
            email: self.commit_author_email.clone(),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }
}

/// Schema of the YAML config file. Secrets are deliberately absent.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub upload_path: Option<String>,
    pub commit_message_template: Option<String>,
    pub upload: UploadSettings,
}

impl ConfigSource for FileConfig {
    fn name(&self) -> &'static str {
        "config file"
    }

    fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Token => None,
            ConfigKey::Owner => self.owner.clone(),
            ConfigKey::Repo => self.repo.clone(),
            ConfigKey::Branch => self.branch.clone(),
            ConfigKey::UploadPath => self.upload_path.clone(),
            ConfigKey::CommitMessageTemplate => self.commit_message_template.clone(),
        }
    }
}

/// Loads the YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))?;

    let config: FileConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config YAML in {}", path_ref.display()))
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML"))?;

    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}

/// Layers `sources` (later wins) into a `RepositoryConfig`. Empty values are
/// treated as unset so they don't shadow an earlier source.
pub fn resolve(sources: &[&dyn ConfigSource]) -> RepositoryConfig {
    let value = |key: ConfigKey| -> String {
        sources
            .iter()
            .rev()
            .find_map(|source| {
                source
                    .get(key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (source.name(), v))
            })
            .map(|(origin, v)| {
                debug!(key = key.env_var(), origin, "Resolved config value");
                v
            })
            .unwrap_or_default()
    };

    RepositoryConfig {
        token: value(ConfigKey::Token),
        owner: value(ConfigKey::Owner),
        repo: value(ConfigKey::Repo),
        branch: value(ConfigKey::Branch),
        upload_path_prefix: value(ConfigKey::UploadPath),
        commit_message_template: value(ConfigKey::CommitMessageTemplate),
    }
}

/// A resolved repository config plus the tuning settings from the file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub repository: RepositoryConfig,
    pub upload: UploadSettings,
}

/// Standard resolution: defaults → optional file → environment → flags.
pub fn resolve_config(config_path: Option<&Path>, overrides: &Overrides) -> Result<ResolvedConfig> {
    let file = match config_path {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let sources: [&dyn ConfigSource; 4] = [&Defaults, &file, &Environment, overrides];
    let repository = resolve(&sources);

    let unset: Vec<&str> = [
        (ConfigKey::Token, &repository.token),
        (ConfigKey::Owner, &repository.owner),
        (ConfigKey::Repo, &repository.repo),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(key, _)| key.env_var())
    .collect();
    if !unset.is_empty() {
        info!(?unset, "Some required settings are unset");
    }

    Ok(ResolvedConfig {
        repository,
        upload: file.upload,
    })
}
