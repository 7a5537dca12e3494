//! Commit status updates and the client that posts them.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use tracing::debug;

use crate::config::GithubConfig;
use crate::error::{NotifierError, Result};
use crate::events::BuildResult;

/// State of a commit status as accepted by the status API.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
        }
    }
}

impl From<BuildResult> for StatusState {
    fn from(result: BuildResult) -> Self {
        match result {
            BuildResult::Success => StatusState::Success,
            BuildResult::Failure => StatusState::Failure,
            BuildResult::Error => StatusState::Error,
        }
    }
}

/// Body of a status update request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusUpdate {
    pub state: StatusState,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub context: String,
}

/// Posts status updates to a statuses endpoint.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn post(&self, url: &str, update: &StatusUpdate) -> Result<()>;
}

/// [`StatusClient`] backed by the GitHub REST API.
pub struct GithubStatusClient {
    http: reqwest::Client,
    api_base: Url,
    accept: String,
    token: String,
}

impl GithubStatusClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut api_base =
            Url::parse(&config.api_url).map_err(|e| NotifierError::InvalidStatusUrl {
                url: config.api_url.clone(),
                reason: e.to_string(),
            })?;
        // `Url::join` replaces the last segment unless the base ends in '/'.
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            api_base,
            accept: config.accept.clone(),
            token: config.token.clone(),
        })
    }

    /// Resolve `statuses_url` against the API base. Absolute URLs must share
    /// the base's origin so the token never leaves the configured host.
    /// Relative URLs are taken relative to the base path; a leading '/' would
    /// discard that path and is refused.
    pub fn resolve(&self, statuses_url: &str) -> Result<Url> {
        if statuses_url.starts_with('/') {
            return Err(NotifierError::InvalidStatusUrl {
                url: statuses_url.to_string(),
                reason: "path must be relative to the API base or a full URL".to_string(),
            });
        }

        let url = self
            .api_base
            .join(statuses_url)
            .map_err(|e| NotifierError::InvalidStatusUrl {
                url: statuses_url.to_string(),
                reason: e.to_string(),
            })?;

        if url.origin() != self.api_base.origin() {
            return Err(NotifierError::UntrustedStatusUrl(url.to_string()));
        }
        Ok(url)
    }
}

#[async_trait]
impl StatusClient for GithubStatusClient {
    async fn post(&self, url: &str, update: &StatusUpdate) -> Result<()> {
        let url = self.resolve(url)?;
        debug!("POST {} state={}", url, update.state.as_str());

        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, &self.accept)
            .json(update)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifierError::StatusRejected { status, body });
        }

        Ok(())
    }
}
