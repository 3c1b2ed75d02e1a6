#![allow(unused)]

//! # contract: data types and seam traits for dataset uploads
//!
//! Plain data describing a batch ([`UploadCandidate`], [`UploadOutcome`],
//! [`BatchSummary`]) plus the three traits the rest of the crate is written
//! against:
//!
//! - [`ContentsApi`]: the hosting API's read/write content endpoints.
//! - [`ProcessRunner`]: running `git` as an external process.
//! - [`Uploader`]: the two upload mechanisms the orchestrator dispatches to.
//!
//! All traits are annotated for `mockall`, so tests (in this crate and
//! downstream) can use `MockContentsApi`, `MockProcessRunner` and
//! `MockUploader`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::RepositoryConfig;
use crate::error::UploadError;

/// How a candidate gets into the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMethod {
    /// One read + one write against the contents API.
    Direct,
    /// Clone, commit and push with Git LFS tracking.
    BulkTransfer,
}

impl UploadMethod {
    /// Label shown to operators.
    pub fn label(&self) -> &'static str {
        match self {
            UploadMethod::Direct => "Direct Upload",
            UploadMethod::BulkTransfer => "Git LFS",
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One file submitted in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub name: String,
    pub content: Vec<u8>,
    pub size_bytes: u64,
}

impl UploadCandidate {
    /// Builds a candidate whose size is the content length.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        let size_bytes = content.len() as u64;
        Self {
            name: name.into(),
            content,
            size_bytes,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Result of uploading one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub candidate_name: String,
    pub method: UploadMethod,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl UploadOutcome {
    pub fn success(candidate_name: impl Into<String>, method: UploadMethod) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            method,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(
        candidate_name: impl Into<String>,
        method: UploadMethod,
        error: &UploadError,
    ) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            method,
            succeeded: false,
            error_detail: Some(error.to_string()),
        }
    }
}

/// Terminal report of one batch run; outcomes are in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_count: usize,
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<UploadOutcome>) -> Self {
        let success_count = outcomes.iter().filter(|o| o.succeeded).count();
        Self {
            success_count,
            failure_count: outcomes.len() - success_count,
            total_count: outcomes.len(),
            outcomes,
        }
    }
}

/// Raw status and body of a hosting API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// JSON body of a contents API write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutContentBody {
    pub message: String,
    /// Base64-encoded file content.
    pub content: String,
    pub branch: String,
    /// Existing blob sha; required when updating a file in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Read/write access to the hosting API's repository contents endpoints.
///
/// Implementations only do transport: status codes are interpreted by the
/// direct uploader. A transport failure with no HTTP status is returned as
/// [`UploadError::Transport`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentsApi: Send + Sync {
    /// `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`
    async fn get_content(
        &self,
        config: &RepositoryConfig,
        path: &str,
    ) -> Result<ApiResponse, UploadError>;

    /// `PUT /repos/{owner}/{repo}/contents/{path}`
    async fn put_content(
        &self,
        config: &RepositoryConfig,
        path: &str,
        body: &PutContentBody,
    ) -> Result<ApiResponse, UploadError>;
}

/// An external process invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
            env: Vec::new(),
            timeout: Duration::from_secs(600),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// `program arg1 arg2 ...`, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished (or killed) process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal, timeout or cancellation.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub interrupted: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external processes. Spawn failures are `io::Error`s; a non-zero exit
/// is a normal [`ProcessOutput`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput>;
}

/// The two upload mechanisms the batch orchestrator dispatches to.
///
/// Implemented by [`crate::RepositoryUploader`] for real uploads and by
/// `MockUploader` in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// `Ok(())` when bulk transfers can run here, `MissingCapability` otherwise.
    async fn check_bulk_capability(&self) -> Result<(), UploadError>;

    async fn upload_direct(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;

    async fn upload_bulk(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;
}
