#![doc = "dataset-push-core: core logic library for dataset-push."]

//! Moves dataset files into a branch of a GitHub repository. Small files go
//! through the contents API ([`direct`]); files at or above the size
//! threshold go through a Git LFS clone/commit/push cycle ([`bulk`]).
//! [`batch::run_batch`] is the entrypoint that classifies and dispatches a
//! whole set of files and reports per-file outcomes.
//!
//! Credential sourcing lives outside this crate: callers hand in a resolved
//! [`config::RepositoryConfig`].

pub mod batch;
pub mod bulk;
pub mod classify;
pub mod config;
pub mod contract;
pub mod direct;
pub mod error;
pub mod github;
pub mod message;
pub mod process;
pub mod uploader;

pub use batch::{run_batch, BatchOptions, BatchProgress};
pub use classify::{classify, DEFAULT_THRESHOLD_BYTES};
pub use config::RepositoryConfig;
pub use contract::{BatchSummary, UploadCandidate, UploadMethod, UploadOutcome, Uploader};
pub use error::{TransferStep, UploadError};
pub use uploader::RepositoryUploader;
