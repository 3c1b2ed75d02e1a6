//! Batch orchestration: classify → dispatch → record, for every submitted file.
//!
//! This module is the top-level entrypoint of the core. Given a resolved
//! [`RepositoryConfig`] and an ordered list of [`UploadCandidate`]s it:
//!   - validates the config once (fatal: [`UploadError::ConfigIncomplete`])
//!   - probes Git LFS once if any candidate needs a bulk transfer
//!     (fatal: [`UploadError::MissingCapability`])
//!   - uploads each candidate through the [`Uploader`] chosen by
//!     [`classify`], turning any per-candidate error into a failed
//!     [`UploadOutcome`]
//!   - reports progress after each candidate and returns a [`BatchSummary`]
//!
//! # Failure policy
//! A failed candidate never stops the others, and nothing already uploaded
//! is rolled back. Every candidate yields exactly one outcome, in submission
//! order, including candidates skipped because the batch was cancelled.
//!
//! # Concurrency
//! Sequential by default. With `max_concurrent_uploads > 1` candidates are
//! driven concurrently on the caller's task through an order-preserving
//! buffered stream; bulk transfers are additionally bounded by
//! `max_concurrent_bulk_transfers` since they all clone and push the same
//! branch.

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classify::{classify, DEFAULT_THRESHOLD_BYTES};
use crate::config::RepositoryConfig;
use crate::contract::{BatchSummary, UploadCandidate, UploadMethod, UploadOutcome, Uploader};
use crate::error::UploadError;

/// Tuning knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub threshold_bytes: u64,
    pub max_concurrent_uploads: usize,
    pub max_concurrent_bulk_transfers: usize,
    pub cancellation: CancellationToken,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            max_concurrent_uploads: 1,
            max_concurrent_bulk_transfers: 1,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Emitted once per finished candidate; `completed` grows by one each time.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub outcome: &'a UploadOutcome,
}

/// Uploads `candidates` in order and returns the per-file summary.
///
/// Only fatal errors are returned as `Err`; in that case no candidate has
/// been uploaded.
pub async fn run_batch<U, F>(
    config: &RepositoryConfig,
    candidates: &[UploadCandidate],
    uploader: &U,
    options: &BatchOptions,
    mut on_progress: F,
) -> Result<BatchSummary, UploadError>
where
    U: Uploader + ?Sized,
    F: FnMut(BatchProgress<'_>),
{
    info!(candidates = candidates.len(), "[BATCH] Starting upload batch");

    if let Err(e) = config.validate() {
        error!(error = %e, "[BATCH][ERROR] Configuration incomplete, aborting batch");
        return Err(e);
    }
    config.trace_loaded();

    let methods: Vec<UploadMethod> = candidates
        .iter()
        .map(|c| classify(c.size_bytes, options.threshold_bytes))
        .collect();

    let bulk_count = methods
        .iter()
        .filter(|m| **m == UploadMethod::BulkTransfer)
        .count();
    if bulk_count > 0 {
        info!(bulk_count, "[BATCH] Bulk transfers required, probing git-lfs");
        if let Err(e) = uploader.check_bulk_capability().await {
            error!(error = %e, "[BATCH][ERROR] git-lfs unavailable, aborting batch");
            return Err(e);
        }
    }

    let bulk_semaphore = Semaphore::new(options.max_concurrent_bulk_transfers.max(1));
    let bulk_permits = &bulk_semaphore;
    let cancel = &options.cancellation;
    let total = candidates.len();
    let mut outcomes: Vec<UploadOutcome> = Vec::with_capacity(total);

    let mut uploads = stream::iter(candidates.iter().zip(methods))
        .map(|(candidate, method)| {
            upload_one(config, candidate, method, uploader, bulk_permits, cancel)
        })
        .buffered(options.max_concurrent_uploads.max(1));

    while let Some(outcome) = uploads.next().await {
        outcomes.push(outcome);
        if let Some(last) = outcomes.last() {
            on_progress(BatchProgress {
                completed: outcomes.len(),
                total,
                outcome: last,
            });
        }
    }

    let summary = BatchSummary::from_outcomes(outcomes);
    info!(
        success = summary.success_count,
        failed = summary.failure_count,
        total = summary.total_count,
        "[BATCH] Upload batch complete"
    );
    Ok(summary)
}

async fn upload_one<U>(
    config: &RepositoryConfig,
    candidate: &UploadCandidate,
    method: UploadMethod,
    uploader: &U,
    bulk_permits: &Semaphore,
    cancel: &CancellationToken,
) -> UploadOutcome
where
    U: Uploader + ?Sized,
{
    if cancel.is_cancelled() {
        warn!(candidate = %candidate.name, "[BATCH] Skipping candidate, batch cancelled");
        return UploadOutcome::failure(&candidate.name, method, &UploadError::Cancelled);
    }

    info!(
        candidate = %candidate.name,
        size_bytes = candidate.size_bytes,
        method = %method,
        "[BATCH] Uploading candidate"
    );
    let result = match method {
        UploadMethod::Direct => uploader.upload_direct(config, candidate, cancel).await,
        UploadMethod::BulkTransfer => match bulk_permits.acquire().await {
            Ok(_permit) => uploader.upload_bulk(config, candidate, cancel).await,
            Err(_) => Err(UploadError::Cancelled),
        },
    };

    match result {
        Ok(()) => {
            info!(candidate = %candidate.name, method = %method, "[BATCH] Candidate uploaded");
            UploadOutcome::success(&candidate.name, method)
        }
        Err(e) => {
            error!(candidate = %candidate.name, method = %method, error = %e, "[BATCH][ERROR] Candidate failed");
            UploadOutcome::failure(&candidate.name, method, &e)
        }
    }
}
