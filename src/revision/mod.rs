//! Branch head lookups used to flag stale uploaded builds.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

mod github;

pub use github::{DEFAULT_GITHUB_API_URL, GitHubRevisions};

/// Future returned by [`RevisionProvider::branch_head_sha`].
pub type RevisionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, RevisionError>> + Send + 'a>>;

/// Errors raised while looking up a branch head.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RevisionError {
    /// Raised when a repository is not in `owner/repo` form.
    #[error("repository {repo} must be in owner/repo form")]
    InvalidRepo {
        /// Offending repository identifier.
        repo: String,
    },
    /// Raised when the branch does not exist.
    #[error("branch {branch} not found in {repo}")]
    BranchNotFound {
        /// Repository searched.
        repo: String,
        /// Missing branch.
        branch: String,
    },
    /// Raised when the request cannot be built or sent.
    #[error("revision lookup for {repo} failed: {message}")]
    Request {
        /// Repository queried.
        repo: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the provider answers with a non-success status.
    #[error("revision lookup for {repo}@{branch} returned HTTP {status}")]
    Status {
        /// Repository queried.
        repo: String,
        /// Branch queried.
        branch: String,
        /// HTTP status code.
        status: u16,
    },
    /// Raised when the provider answers with an empty commit id.
    #[error("revision lookup for {repo}@{branch} returned no commit id")]
    EmptyResponse {
        /// Repository queried.
        repo: String,
        /// Branch queried.
        branch: String,
    },
}

impl Classify for RevisionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRepo { .. } => ErrorKind::Invalid,
            Self::BranchNotFound { .. } => ErrorKind::NotFound,
            Self::Request { .. } | Self::Status { .. } => ErrorKind::Io,
            Self::EmptyResponse { .. } => ErrorKind::Internal,
        }
    }
}

/// Reports the current head commit of a branch.
pub trait RevisionProvider: Send + Sync {
    /// Returns the commit id at the head of `branch` in `repo`.
    fn branch_head_sha<'a>(&'a self, repo: &'a str, branch: &'a str) -> RevisionFuture<'a>;
}

/// Splits `owner/repo` into its two components.
///
/// # Errors
///
/// Returns [`RevisionError::InvalidRepo`] when either part is missing or
/// extra separators are present.
pub fn split_repo(repo: &str) -> Result<(&str, &str), RevisionError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(RevisionError::InvalidRepo {
            repo: repo.to_owned(),
        }),
    }
}
