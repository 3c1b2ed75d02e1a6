//! Contents API client for GitHub (and GitHub Enterprise via a custom base URL).

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Url};
use tracing::{debug, error};

use crate::config::RepositoryConfig;
use crate::contract::{ApiResponse, ContentsApi, PutContentBody};
use crate::error::UploadError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const ACCEPT_V3: &str = "application/vnd.github.v3+json";

pub struct GitHubClient {
    http: Client,
    base_url: Url,
}

impl GitHubClient {
    pub fn new() -> Result<Self, UploadError> {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, UploadError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UploadError::Transport(format!("invalid API base URL {base_url}: {e}")))?;
        let http = Client::builder()
            .user_agent(concat!("dataset-push/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    /// `{base}/repos/{owner}/{repo}/contents/{path...}` with every segment
    /// percent-encoded.
    fn contents_url(&self, config: &RepositoryConfig, path: &str) -> Result<Url, UploadError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                UploadError::Transport(format!("API base URL {} cannot be a base", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", config.owner.as_str(), config.repo.as_str(), "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn authorised(&self, request: RequestBuilder, config: &RepositoryConfig) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("token {}", config.token))
            .header(ACCEPT, ACCEPT_V3)
    }

    async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, UploadError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl ContentsApi for GitHubClient {
    async fn get_content(
        &self,
        config: &RepositoryConfig,
        path: &str,
    ) -> Result<ApiResponse, UploadError> {
        let mut url = self.contents_url(config, path)?;
        url.query_pairs_mut().append_pair("ref", &config.branch);
        debug!(path, branch = %config.branch, "GET content descriptor");

        let response = self
            .authorised(self.http.get(url), config)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, path, "Contents API read failed");
                UploadError::from(e)
            })?;
        Self::into_api_response(response).await
    }

    async fn put_content(
        &self,
        config: &RepositoryConfig,
        path: &str,
        body: &PutContentBody,
    ) -> Result<ApiResponse, UploadError> {
        let url = self.contents_url(config, path)?;
        debug!(path, branch = %body.branch, update = body.sha.is_some(), "PUT content");

        let response = self
            .authorised(self.http.put(url), config)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, path, "Contents API write failed");
                UploadError::from(e)
            })?;
        Self::into_api_response(response).await
    }
}
