use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::repo::RepoRef;
use crate::config::PullRequestSettings;
use crate::errors::{MaintainerError, Result};

const USER_AGENT: &str = "maintainer";
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of asking the provider to fork the upstream repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkOutcome {
    Created,
    AlreadyExists,
}

/// Result of reconciling the working branch with an upstream pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullRequestOutcome {
    Created { url: String },
    /// A PR for the branch was already open; the force-push updated it.
    AlreadyExists { url: String },
    /// Creation was rejected as a duplicate but no open PR could be found.
    ExistsUnresolved,
}

impl PullRequestOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Created { url } | Self::AlreadyExists { url } => Some(url),
            Self::ExistsUnresolved => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Created { .. } => "PR created successfully",
            Self::AlreadyExists { .. } => "PR already exists but was force-updated",
            Self::ExistsUnresolved => "PR exists but URL not found",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestInfo {
    html_url: String,
}

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

/// Client for the hosting provider's REST API, bound to one account.
#[derive(Clone)]
pub struct HostingClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    user: String,
}

impl HostingClient {
    pub fn new(api_url: &str, token: &str, user: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            user: user.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        debug!(%method, %url, "hosting API request");
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
    }

    /// Fork `repo` into the configured account.
    ///
    /// 202 means a fork was (or is being) created; 422 means one already
    /// exists. Any other status is a transport failure.
    pub async fn fork(&self, repo: &RepoRef) -> Result<ForkOutcome> {
        let resp = self
            .request(Method::POST, &format!("/repos/{}/forks", repo.slug()))
            .send()
            .await?;

        match resp.status() {
            StatusCode::ACCEPTED => {
                info!(repo = %repo.slug(), "fork created");
                Ok(ForkOutcome::Created)
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                info!(repo = %repo.slug(), "fork already exists");
                Ok(ForkOutcome::AlreadyExists)
            }
            status => Err(transport_failure("fork repository", status, resp).await),
        }
    }

    /// The upstream repository's default branch name.
    pub async fn default_branch(&self, repo: &RepoRef) -> Result<String> {
        let resp = self
            .request(Method::GET, &format!("/repos/{}", repo.slug()))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(transport_failure("get repository", status, resp).await);
        }
        let info: RepositoryInfo = resp.json().await?;
        Ok(info.default_branch)
    }

    /// Open a PR from `<user>:<branch>` into `base`, or locate the one that
    /// is already open for that head.
    pub async fn create_or_find(
        &self,
        repo: &RepoRef,
        settings: &PullRequestSettings,
        branch: &str,
        base: &str,
    ) -> Result<PullRequestOutcome> {
        let head = format!("{}:{}", self.user, branch);
        let path = format!("/repos/{}/pulls", repo.slug());

        let resp = self
            .request(Method::POST, &path)
            .json(&NewPullRequest {
                title: &settings.title,
                body: &settings.body,
                head: &head,
                base,
            })
            .send()
            .await?;

        match resp.status() {
            StatusCode::CREATED => {
                let pr: PullRequestInfo = resp.json().await?;
                info!(url = %pr.html_url, "pull request created");
                Ok(PullRequestOutcome::Created { url: pr.html_url })
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let resp = self
                    .request(Method::GET, &path)
                    .query(&[("head", head.as_str()), ("state", "open")])
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(transport_failure("list pull requests", status, resp).await);
                }
                let open: Vec<PullRequestInfo> = resp.json().await?;
                match open.into_iter().next() {
                    Some(pr) => {
                        info!(url = %pr.html_url, "pull request already open");
                        Ok(PullRequestOutcome::AlreadyExists { url: pr.html_url })
                    }
                    None => Ok(PullRequestOutcome::ExistsUnresolved),
                }
            }
            status => Err(transport_failure("create pull request", status, resp).await),
        }
    }
}

async fn transport_failure(
    operation: &str,
    status: StatusCode,
    resp: reqwest::Response,
) -> MaintainerError {
    let body = resp.text().await.unwrap_or_default();
    MaintainerError::TransportFailure {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    }
}
