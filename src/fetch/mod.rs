//! Host fetching.
//!
//! The crawler reaches the network exclusively through the [`Fetcher`]
//! trait; the directory walker and host pipeline take it as an injected
//! capability, which is what lets the scan scenarios run against a frozen
//! in-memory fetch surface.

pub mod client;

pub use client::{init_client, HttpFetcher};

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of a fetch attempt.
///
/// "Offline" covers everything that is not a 200 with readable headers:
/// network errors, timeouts and non-200 statuses. None of those are
/// failures of the scan itself.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub online: bool,
    pub body: String,
}

impl FetchOutcome {
    /// Host unreachable or unwilling.
    pub fn offline() -> Self {
        FetchOutcome {
            online: false,
            body: String::new(),
        }
    }

    /// Host answered 200; body may be empty when the read failed after
    /// good headers.
    pub fn online(body: String) -> Self {
        FetchOutcome { online: true, body }
    }
}

/// HTTP GET capability consumed by the pipeline and the walker.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL, mapping transport errors and non-200 statuses to
    /// an offline outcome.
    ///
    /// # Errors
    ///
    /// Only hard local failures (e.g. a request that cannot even be
    /// constructed) surface as errors.
    async fn check_and_fetch(&self, url: &str) -> Result<FetchOutcome>;
}
