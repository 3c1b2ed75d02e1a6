//! Bulk transfer: clone → write → `git lfs track` → commit → push, one file at a time.
//!
//! Each upload runs in its own scratch directory which is removed when the
//! upload returns, whatever the outcome. There is no rollback: if a later step
//! fails, whatever an earlier step already pushed stays pushed.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RepositoryConfig;
use crate::contract::{CommandSpec, ProcessOutput, ProcessRunner, UploadCandidate};
use crate::error::{TransferStep, UploadError};
use crate::message::render_commit_message;

pub const DEFAULT_GIT_HOST: &str = "github.com";
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(600);
const LFS_ATTRIBUTES_FILE: &str = ".gitattributes";

/// Author/committer used for bulk-transfer commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "Chatbot Admin".to_string(),
            email: "admin@chatbot.com".to_string(),
        }
    }
}

pub struct BulkTransferUploader<P> {
    runner: P,
    identity: CommitIdentity,
    git_host: String,
    step_timeout: Duration,
}

impl<P: ProcessRunner> BulkTransferUploader<P> {
    pub fn new(runner: P) -> Self {
        Self {
            runner,
            identity: CommitIdentity::default(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_git_host(mut self, host: impl Into<String>) -> Self {
        self.git_host = host.into();
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Probes `git lfs version`.
    pub async fn check_capability(&self) -> Result<(), UploadError> {
        let spec = CommandSpec::new("git", ["lfs", "version"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.step_timeout);
        match self.runner.run(&spec).await {
            Ok(out) if out.success() => {
                info!(version = %out.stdout.trim(), "git-lfs available");
                Ok(())
            }
            Ok(out) => {
                error!(exit_code = ?out.exit_code, stderr = %out.stderr.trim(), "git-lfs probe failed");
                Err(UploadError::MissingCapability(describe_failure(&out)))
            }
            Err(e) => {
                error!(error = %e, "Failed to launch git for git-lfs probe");
                Err(UploadError::MissingCapability(e.to_string()))
            }
        }
    }

    /// Clone URL with the token embedded as the userinfo.
    pub fn clone_url(&self, config: &RepositoryConfig) -> String {
        format!(
            "https://{}@{}/{}/{}.git",
            config.token, self.git_host, config.owner, config.repo
        )
    }

    pub async fn upload(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        checkpoint(cancel)?;
        let target = config.target_path(&candidate.name)?;
        let workdir = tempfile::Builder::new()
            .prefix("dataset-push-")
            .tempdir()
            .map_err(|e| UploadError::step(TransferStep::Workspace, e.to_string()))?;
        let repo_dir = workdir.path().join("repo");
        info!(
            candidate = %candidate.name,
            path = %target,
            size_bytes = candidate.size_bytes,
            workdir = %workdir.path().display(),
            "Starting bulk transfer"
        );

        let result = self
            .transfer(config, candidate, cancel, &repo_dir, &target)
            .await;
        match &result {
            Ok(()) => info!(candidate = %candidate.name, path = %target, "Bulk transfer succeeded"),
            Err(e) => error!(candidate = %candidate.name, path = %target, error = %e, "Bulk transfer failed"),
        }
        // `workdir` is dropped here and removes the clone on every path.
        result
    }

    async fn transfer(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
        repo_dir: &Path,
        target: &str,
    ) -> Result<(), UploadError> {
        let repo_dir_arg = repo_dir.to_string_lossy().into_owned();
        self.git(
            config,
            cancel,
            TransferStep::Clone,
            None,
            vec![
                "clone".into(),
                "--depth".into(),
                "1".into(),
                "--branch".into(),
                config.branch.clone(),
                self.clone_url(config),
                repo_dir_arg,
            ],
        )
        .await?;

        let dir = Some(repo_dir);
        self.git(
            config,
            cancel,
            TransferStep::ConfigureIdentity,
            dir,
            vec!["config".into(), "user.email".into(), self.identity.email.clone()],
        )
        .await?;
        self.git(
            config,
            cancel,
            TransferStep::ConfigureIdentity,
            dir,
            vec!["config".into(), "user.name".into(), self.identity.name.clone()],
        )
        .await?;
        self.git(
            config,
            cancel,
            TransferStep::LfsInstall,
            dir,
            vec!["lfs".into(), "install".into(), "--local".into()],
        )
        .await?;

        checkpoint(cancel)?;
        let file_path = repo_dir.join(target);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                UploadError::step(TransferStep::PrepareDirectories, e.to_string())
            })?;
        }

        checkpoint(cancel)?;
        tokio::fs::write(&file_path, &candidate.content)
            .await
            .map_err(|e| UploadError::step(TransferStep::WriteContent, e.to_string()))?;
        debug!(path = %file_path.display(), bytes = candidate.content.len(), "Wrote content into working copy");

        self.git(
            config,
            cancel,
            TransferStep::Track,
            dir,
            vec!["lfs".into(), "track".into(), lfs_track_pattern(&candidate.name, target)],
        )
        .await?;
        self.git(
            config,
            cancel,
            TransferStep::Stage,
            dir,
            vec!["add".into(), LFS_ATTRIBUTES_FILE.into()],
        )
        .await?;
        self.git(
            config,
            cancel,
            TransferStep::Stage,
            dir,
            vec!["add".into(), target.to_string()],
        )
        .await?;

        let message = render_commit_message(&config.commit_message_template, &candidate.name);
        self.git(
            config,
            cancel,
            TransferStep::Commit,
            dir,
            vec!["commit".into(), "-m".into(), message],
        )
        .await?;
        self.git(
            config,
            cancel,
            TransferStep::Push,
            dir,
            vec!["push".into(), "origin".into(), config.branch.clone()],
        )
        .await?;
        Ok(())
    }

    /// Runs one git command; any non-zero exit fails `step`.
    async fn git(
        &self,
        config: &RepositoryConfig,
        cancel: &CancellationToken,
        step: TransferStep,
        dir: Option<&Path>,
        args: Vec<String>,
    ) -> Result<ProcessOutput, UploadError> {
        checkpoint(cancel)?;
        let mut spec = CommandSpec::new("git", args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.step_timeout)
            .cancellation(cancel.clone());
        if let Some(dir) = dir {
            spec = spec.current_dir(dir);
        }
        info!(step = %step, command = %config.redact(&spec.display()), "Running git step");

        let out = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| UploadError::step(step, config.redact(&e.to_string())))?;

        if out.interrupted {
            return Err(UploadError::Cancelled);
        }
        if !out.success() {
            return Err(UploadError::step(
                step,
                config.redact(&describe_failure(&out)),
            ));
        }
        debug!(step = %step, stdout = %config.redact(out.stdout.trim()), "git step completed");
        Ok(out)
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        Err(UploadError::Cancelled)
    } else {
        Ok(())
    }
}

fn describe_failure(out: &ProcessOutput) -> String {
    if out.timed_out {
        return "timed out".to_string();
    }
    let stderr = out.stderr.trim();
    match (out.exit_code, stderr.is_empty()) {
        (Some(code), true) => format!("exited with code {code}"),
        (Some(code), false) => format!("exited with code {code}: {stderr}"),
        (None, true) => "terminated by signal".to_string(),
        (None, false) => stderr.to_string(),
    }
}

/// `*.ext` for the candidate's extension, or the exact path when there is none.
fn lfs_track_pattern(name: &str, target: &str) -> String {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("*.{ext}"),
        _ => target.to_string(),
    }
}
