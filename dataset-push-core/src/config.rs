use std::fmt;

use tracing::{debug, info};

use crate::error::UploadError;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_UPLOAD_PATH: &str = "data/";
pub const DEFAULT_COMMIT_MESSAGE_TEMPLATE: &str = "Add dataset: {filename} - {timestamp}";

/// Resolved repository settings for one batch run.
///
/// Built once by whatever resolves credentials (environment, YAML, CLI flags)
/// and passed down by reference to every uploader call. The token never shows
/// up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Directory inside the repository; empty means the repository root.
    pub upload_path_prefix: String,
    /// Supports `{filename}` and `{timestamp}` placeholders.
    pub commit_message_template: String,
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("upload_path_prefix", &self.upload_path_prefix)
            .field("commit_message_template", &self.commit_message_template)
            .finish()
    }
}

impl RepositoryConfig {
    /// Checks that every required field is non-empty.
    ///
    /// `upload_path_prefix` is optional: an empty prefix uploads to the root.
    pub fn validate(&self) -> Result<(), UploadError> {
        let required = [
            ("token", &self.token),
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("branch", &self.branch),
            ("commit_message_template", &self.commit_message_template),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::ConfigIncomplete { missing })
        }
    }

    /// Repository-relative path for a file called `name`.
    ///
    /// Backslashes become `/`, empty and `.` segments are dropped. A `..`
    /// segment anywhere, or a name that normalises to nothing, is rejected so
    /// both upload methods agree on where a file may land.
    pub fn target_path(&self, name: &str) -> Result<String, UploadError> {
        let joined = format!("{}/{}", self.upload_path_prefix, name).replace('\\', "/");
        let invalid = || UploadError::InvalidTargetPath {
            path: joined.trim_matches('/').to_string(),
        };

        let mut segments = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(invalid()),
                s => segments.push(s),
            }
        }
        let name_is_empty = name
            .replace('\\', "/")
            .split('/')
            .all(|s| s.is_empty() || s == ".");
        if name_is_empty {
            return Err(invalid());
        }
        Ok(segments.join("/"))
    }

    /// Replaces every occurrence of the token in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.token, "***")
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            owner = %self.owner,
            repo = %self.repo,
            branch = %self.branch,
            upload_path = %self.upload_path_prefix,
            "Loaded repository config"
        );
        debug!(config = ?self, "Repository config (full debug)");
    }
}
