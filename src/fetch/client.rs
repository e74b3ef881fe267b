//! HTTP client construction and the production [`Fetcher`].
//!
//! One client instance is shared by every worker. Redirects are never
//! followed (a redirect target is a different authority than the scan
//! index reported) and certificate validation is disabled to maximize
//! data capture from the self-signed and misconfigured servers this tool
//! exists to find.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::ClientBuilder;

use super::{FetchOutcome, Fetcher};
use crate::config::{ACCEPT_HTML, MAX_RESPONSE_BODY_SIZE, TCP_CONNECT_TIMEOUT_SECS, USER_AGENT};

/// Builds the shared HTTP client.
///
/// Configured with:
/// - total request timeout and a short TCP connect timeout
/// - redirect following DISABLED
/// - certificate validation disabled
/// - a desktop browser User-Agent
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(timeout_seconds: u64) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(Arc::new(client))
}

/// Production fetcher over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Arc<reqwest::Client>,
}

impl HttpFetcher {
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn check_and_fetch(&self, url: &str) -> Result<FetchOutcome> {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_HTML)
            .build()
            .with_context(|| format!("failed to build request for {url}"))?;

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                log::debug!("Host offline or unreachable: {url} ({error})");
                return Ok(FetchOutcome::offline());
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            log::debug!(
                "Host responded with non-OK status: {url} ({})",
                response.status()
            );
            return Ok(FetchOutcome::offline());
        }

        // Headers were good; body problems no longer make the host
        // "offline", they just leave the body empty.
        match stream_body_with_limit(response, MAX_RESPONSE_BODY_SIZE).await {
            Ok(Some(body)) => Ok(FetchOutcome::online(body)),
            Ok(None) => {
                log::debug!("Body of {url} exceeded size cap, dropping content");
                Ok(FetchOutcome::online(String::new()))
            }
            Err(error) => {
                log::debug!("Failed to read body of {url}: {error}");
                Ok(FetchOutcome::online(String::new()))
            }
        }
    }
}

/// Streams a response body, aborting once `max_size` is exceeded.
///
/// Unlike `response.text().await`, which buffers whatever the server
/// sends, this reads incrementally so a hostile endpoint cannot balloon
/// the process. Returns `Ok(None)` when the limit was hit.
async fn stream_body_with_limit(
    response: reqwest::Response,
    max_size: usize,
) -> Result<Option<String>> {
    let mut stream = response.bytes_stream();
    let mut accumulated = Vec::with_capacity(max_size.min(64 * 1024));

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if accumulated.len() + chunk.len() > max_size {
            return Ok(None);
        }
        accumulated.extend_from_slice(&chunk);
    }

    Ok(Some(String::from_utf8_lossy(&accumulated).into_owned()))
}
