//! # dataset-push CLI
//!
//! Command parsing and orchestration glue for the `dataset-push` binary.
//! Everything that touches the repository lives in [`dataset_push_core`];
//! this module only resolves configuration, reads the selected files, and
//! renders progress and the final tally.
//!
//! ## Subcommands
//! - `plan`: prints the upload plan (size and method per file) without
//!   touching the network.
//! - `upload`: runs the batch and reports one line per file.
//!
//! For programmatic or integration use call [`run`] with a constructed
//! [`Cli`].

use crate::candidates::{format_plan, load_candidates, plan};
use crate::load_config::{load_config, resolve_config, Overrides, UploadSettings};
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use dataset_push_core::bulk::BulkTransferUploader;
use dataset_push_core::direct::DirectUploader;
use dataset_push_core::github::GitHubClient;
use dataset_push_core::process::TokioProcessRunner;
use dataset_push_core::{
    run_batch, BatchOptions, BatchProgress, BatchSummary, RepositoryConfig, RepositoryUploader,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// CLI for dataset-push: upload dataset files into a GitHub repository branch.
#[derive(Parser, Debug)]
#[clap(
    name = "dataset-push",
    version,
    about = "Upload dataset files to a GitHub repository, routing large files through Git LFS"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how each file would be uploaded, without uploading
    Plan {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Files to include
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload files to the configured repository branch
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        #[clap(flatten)]
        repository: RepositoryArgs,
        /// Print the batch summary as JSON instead of the tally
        #[clap(long)]
        json: bool,
        /// Number of files uploaded at the same time
        #[clap(long)]
        concurrency: Option<usize>,
        /// Files to upload
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Repository settings that may be given on the command line. The token is
/// intentionally not among them.
#[derive(Args, Debug, Default, Clone)]
pub struct RepositoryArgs {
    /// Repository owner (overrides REPO_OWNER)
    #[clap(long)]
    pub owner: Option<String>,
    /// Repository name (overrides REPO_NAME)
    #[clap(long)]
    pub repo: Option<String>,
    /// Target branch (overrides BRANCH_NAME)
    #[clap(long)]
    pub branch: Option<String>,
    /// Directory prefix inside the repository (overrides UPLOAD_PATH)
    #[clap(long)]
    pub upload_path: Option<String>,
    /// Commit message template with {filename} and {timestamp} placeholders
    #[clap(long = "message-template")]
    pub commit_message_template: Option<String>,
}

impl From<RepositoryArgs> for Overrides {
    fn from(args: RepositoryArgs) -> Self {
        Overrides {
            owner: args.owner,
            repo: args.repo,
            branch: args.branch,
            upload_path: args.upload_path,
            commit_message_template: args.commit_message_template,
        }
    }
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Plan { config, files } => {
            let settings = match config {
                Some(path) => load_config(path)?.upload,
                None => UploadSettings::default(),
            };
            let candidates = load_candidates(&files, &settings.allowed_extensions)?;
            print!("{}", format_plan(&plan(&candidates, settings.threshold_bytes())));
            tracing::info!(command = "plan", files = candidates.len(), "Plan printed");
            Ok(())
        }
        Commands::Upload {
            config,
            repository,
            json,
            concurrency,
            files,
        } => {
            let resolved = resolve_config(config.as_deref(), &repository.into())?;
            let settings = resolved.upload;
            let candidates = load_candidates(&files, &settings.allowed_extensions)?;
            if !json {
                print!("{}", format_plan(&plan(&candidates, settings.threshold_bytes())));
            }

            let uploader = build_uploader(&settings)?;
            let cancellation = CancellationToken::new();
            spawn_ctrl_c_handler(cancellation.clone());
            let options = BatchOptions {
                threshold_bytes: settings.threshold_bytes(),
                max_concurrent_uploads: concurrency.unwrap_or(settings.max_concurrent_uploads),
                max_concurrent_bulk_transfers: settings.max_concurrent_bulk_transfers,
                cancellation,
            };

            tracing::info!(command = "upload", files = candidates.len(), "Starting upload");
            let summary = match run_batch(
                &resolved.repository,
                &candidates,
                &uploader,
                &options,
                |progress| {
                    if !json {
                        println!("{}", progress_line(&progress));
                    }
                },
            )
            .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(command = "upload", error = %e, "Upload batch aborted");
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!(
                    "{}",
                    format_tally(&summary, &resolved.repository, &settings.git_host)
                );
            }

            if summary.failure_count > 0 {
                bail!(
                    "{} of {} files failed to upload",
                    summary.failure_count,
                    summary.total_count
                );
            }
            Ok(())
        }
    }
}

/// GitHub contents API for small files, the system `git` for large ones.
fn build_uploader(
    settings: &UploadSettings,
) -> Result<RepositoryUploader<GitHubClient, TokioProcessRunner>> {
    let direct = DirectUploader::new(GitHubClient::with_base_url(&settings.api_base_url)?);
    let bulk = BulkTransferUploader::new(TokioProcessRunner)
        .with_git_host(settings.git_host.as_str())
        .with_identity(settings.commit_identity())
        .with_step_timeout(settings.step_timeout());
    Ok(RepositoryUploader::new(direct, bulk))
}

fn spawn_ctrl_c_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling remaining uploads");
            cancellation.cancel();
        }
    });
}

fn progress_line(progress: &BatchProgress<'_>) -> String {
    let outcome = progress.outcome;
    let status = if outcome.succeeded { "ok" } else { "FAILED" };
    let mut line = format!(
        "[{}/{}] {} {} ({})",
        progress.completed, progress.total, status, outcome.candidate_name, outcome.method
    );
    if let Some(detail) = &outcome.error_detail {
        line.push_str(": ");
        line.push_str(detail);
    }
    line
}

fn format_tally(summary: &BatchSummary, config: &RepositoryConfig, git_host: &str) -> String {
    let mut out = format!(
        "Successful: {} | Failed: {} | Total: {}\n",
        summary.success_count, summary.failure_count, summary.total_count
    );
    if summary.success_count > 0 {
        out.push_str(&format!(
            "Repository: https://{}/{}/{}\n",
            git_host, config.owner, config.repo
        ));
    }
    out
}
