//! Error types shared by the uploaders and the batch orchestrator.

use std::fmt;

use thiserror::Error;

/// A single step of the bulk-transfer (Git LFS) pipeline.
///
/// Carried by [`UploadError::TransferStepFailed`] so callers can tell which
/// part of the clone → commit → push cycle broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    Workspace,
    Clone,
    ConfigureIdentity,
    LfsInstall,
    PrepareDirectories,
    WriteContent,
    Track,
    Stage,
    Commit,
    Push,
}

impl TransferStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStep::Workspace => "workspace",
            TransferStep::Clone => "clone",
            TransferStep::ConfigureIdentity => "configure-identity",
            TransferStep::LfsInstall => "lfs-install",
            TransferStep::PrepareDirectories => "prepare-directories",
            TransferStep::WriteContent => "write-content",
            TransferStep::Track => "lfs-track",
            TransferStep::Stage => "stage",
            TransferStep::Commit => "commit",
            TransferStep::Push => "push",
        }
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating or running an upload batch.
///
/// `ConfigIncomplete` and `MissingCapability` are fatal for a whole batch;
/// every other variant is local to one candidate and ends up in that
/// candidate's outcome.
#[derive(Error, Debug)]
pub enum UploadError {
    /// One or more required configuration fields are empty.
    #[error("repository configuration incomplete: missing {}", .missing.join(", "))]
    ConfigIncomplete { missing: Vec<&'static str> },

    /// Git LFS is not usable in this environment.
    #[error("git-lfs is not available: {0}")]
    MissingCapability(String),

    /// The hosting API answered with an unexpected status.
    #[error("hosting API request failed with status {status_code}: {body}")]
    ApiFailure { status_code: u16, body: String },

    /// The content identifier supplied for an update was stale.
    #[error("conflict: content at {path} changed concurrently (stale sha)")]
    Conflict { path: String },

    /// The file would land outside the repository.
    #[error("invalid target path {path:?}: must stay inside the repository")]
    InvalidTargetPath { path: String },

    /// The request never produced an HTTP status (DNS, TLS, connection reset...).
    #[error("transport error talking to hosting API: {0}")]
    Transport(String),

    /// A step of the clone/commit/push cycle failed.
    #[error("bulk transfer failed at step '{step}': {detail}")]
    TransferStepFailed { step: TransferStep, detail: String },

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// True for errors that abort the whole batch rather than one candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::ConfigIncomplete { .. } | UploadError::MissingCapability(_)
        )
    }

    pub(crate) fn step(step: TransferStep, detail: impl Into<String>) -> Self {
        UploadError::TransferStepFailed {
            step,
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it never carries the token, but keeps messages short.
        UploadError::Transport(err.without_url().to_string())
    }
}
