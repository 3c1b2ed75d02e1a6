//! Direct upload: one contents API read plus one write per file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RepositoryConfig;
use crate::contract::{ContentsApi, PutContentBody, UploadCandidate};
use crate::error::UploadError;
use crate::message::render_commit_message;

#[derive(Deserialize)]
struct ContentDescriptor {
    sha: String,
}

/// Creates or updates a single file through the hosting API's contents
/// endpoints.
pub struct DirectUploader<A> {
    api: A,
    conflict_retries: u32,
}

impl<A: ContentsApi> DirectUploader<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            conflict_retries: 1,
        }
    }

    /// How many times a stale-sha conflict is retried after re-fetching the sha.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub async fn upload(
        &self,
        config: &RepositoryConfig,
        candidate: &UploadCandidate,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let path = config.target_path(&candidate.name)?;
        let content = BASE64.encode(&candidate.content);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let sha = self.existing_sha(config, &path).await?;
            let body = PutContentBody {
                message: render_commit_message(&config.commit_message_template, &candidate.name),
                content: content.clone(),
                branch: config.branch.clone(),
                sha,
            };
            info!(
                candidate = %candidate.name,
                path = %path,
                update = body.sha.is_some(),
                attempt,
                "Writing file via contents API"
            );

            let response = self.api.put_content(config, &path, &body).await?;
            match response.status {
                200 | 201 => {
                    info!(candidate = %candidate.name, path = %path, status = response.status, "Direct upload succeeded");
                    return Ok(());
                }
                409 if attempt < self.conflict_retries => {
                    warn!(candidate = %candidate.name, path = %path, "Stale sha, re-fetching and retrying");
                    attempt += 1;
                }
                409 => {
                    error!(candidate = %candidate.name, path = %path, "Stale sha conflict persisted");
                    return Err(UploadError::Conflict { path });
                }
                status => {
                    error!(candidate = %candidate.name, path = %path, status, "Contents API write failed");
                    return Err(UploadError::ApiFailure {
                        status_code: status,
                        body: config.redact(&response.body),
                    });
                }
            }
        }
    }

    /// `Some(sha)` if the file exists on the branch, `None` if it must be created.
    async fn existing_sha(
        &self,
        config: &RepositoryConfig,
        path: &str,
    ) -> Result<Option<String>, UploadError> {
        let response = self.api.get_content(config, path).await?;
        match response.status {
            200 => {
                let descriptor: ContentDescriptor = serde_json::from_str(&response.body)
                    .map_err(|e| UploadError::ApiFailure {
                        status_code: 200,
                        body: format!("unreadable content descriptor: {e}"),
                    })?;
                debug!(path, sha = %descriptor.sha, "Found existing file");
                Ok(Some(descriptor.sha))
            }
            404 => {
                debug!(path, "No existing file, creating");
                Ok(None)
            }
            status => Err(UploadError::ApiFailure {
                status_code: status,
                body: config.redact(&response.body),
            }),
        }
    }
}
