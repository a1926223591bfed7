//! Shared HTTP client construction for network collaborators.

use std::time::Duration;

const USER_AGENT: &str = concat!("buildbay/", env!("CARGO_PKG_VERSION"));

/// Builds a client whose requests give up after `timeout`.
///
/// The timeout is the only cancellation mechanism network calls honour.
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
