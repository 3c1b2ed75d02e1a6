use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bulk::BulkTransferUploader;
use crate::config::RepositoryConfig;
use crate::contract::{ContentsApi, ProcessRunner, UploadCandidate, Uploader};
use crate::direct::DirectUploader;
use crate::error::UploadError;

/// Real [`Uploader`]: the contents API for small files, Git LFS for large ones.
pub struct RepositoryUploader<A, P> {
    direct: DirectUploader<A>,
    bulk: BulkTransferUploader<P>,
}

impl<A: ContentsApi, P: ProcessRunner> RepositoryUploader<A, P> {
    pub fn new(direct: DirectUploader<A>, bulk: BulkTransferUploader<P>) -> Self {
        Self { direct, bulk }
    }
}

#[async_trait]
impl<A: ContentsApi, P: ProcessRunner> Uploader for RepositoryUploader<A, P> {
    async fn check_bulk_capability(&self) -> Result<(), UploadError> {
        self.bulk.check_capability().await
    }

    async fn upload_direct(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        self.direct.upload(config, candidate, cancel).await
    }

    async fn upload_bulk(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        self.bulk.upload(config, candidate, cancel).await
    }
}
