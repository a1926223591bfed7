//! GitHub commits API backed revision provider.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};

use super::{RevisionError, RevisionFuture, RevisionProvider, split_repo};

/// Public GitHub REST endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const SHA_MEDIA_TYPE: &str = "application/vnd.github.sha";

/// Resolves branch heads through `GET /repos/{owner}/{repo}/commits/{ref}`.
#[derive(Clone, Debug)]
pub struct GitHubRevisions {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubRevisions {
    /// Creates a provider talking to `api_url`, authenticating with `token`
    /// when present.
    ///
    /// # Errors
    ///
    /// Returns [`RevisionError::Request`] when the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RevisionError> {
        let parsed = Url::parse(api_url).map_err(|err| request_error(api_url, err))?;
        let client = crate::http::client(timeout).map_err(|err| request_error(api_url, err))?;
        Ok(Self {
            client,
            api_url: parsed,
            token,
        })
    }

    fn commit_url(&self, repo: &str, branch: &str) -> Result<Url, RevisionError> {
        let (owner, name) = split_repo(repo)?;
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| request_error(repo, "API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["repos", owner, name, "commits", branch]);
        Ok(url)
    }

    async fn head(&self, repo: &str, branch: &str) -> Result<String, RevisionError> {
        let url = self.commit_url(repo, branch)?;
        let mut request = self.client.get(url).header(ACCEPT, SHA_MEDIA_TYPE);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| request_error(repo, err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(RevisionError::BranchNotFound {
                repo: repo.to_owned(),
                branch: branch.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(RevisionError::Status {
                repo: repo.to_owned(),
                branch: branch.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| request_error(repo, err))?;
        let sha = body.trim();
        if sha.is_empty() {
            return Err(RevisionError::EmptyResponse {
                repo: repo.to_owned(),
                branch: branch.to_owned(),
            });
        }
        Ok(sha.to_owned())
    }
}

impl RevisionProvider for GitHubRevisions {
    fn branch_head_sha<'a>(&'a self, repo: &'a str, branch: &'a str) -> RevisionFuture<'a> {
        Box::pin(self.head(repo, branch))
    }
}

fn request_error(repo: &str, err: impl std::fmt::Display) -> RevisionError {
    RevisionError::Request {
        repo: repo.to_owned(),
        message: err.to_string(),
    }
}
