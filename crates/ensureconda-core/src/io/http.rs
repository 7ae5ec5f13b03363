//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::{Client, Response};

/// Connect timeout for index and archive requests. Body reads stay unbounded
/// so large archives on slow links still complete.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the client used across one invocation.
pub fn client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(crate::USER_AGENT)
        .build()
}

/// GET `url` and fail on any non-success status.
pub async fn get(client: &Client, url: &str) -> reqwest::Result<Response> {
    client.get(url).send().await?.error_for_status()
}
