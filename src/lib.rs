//! Open directory reconnaissance crawler.
//!
//! Takes a host list exported from an Internet-scan index and, for each
//! endpoint, determines whether it serves an open directory listing,
//! enumerates reachable files (optionally recursing with depth and size
//! budgets), applies extension filters and optionally probes candidate
//! files for binary content. Results land in three text streams: raw,
//! filtered and a host-grouped binary report.
//!
//! The library surface is a [`Run`] assembled from injected capabilities
//! ([`fetch::Fetcher`], [`probe::Prober`], an [`output::OutputSink`]), so
//! scans are reproducible against a frozen fetch surface.
//!
//! ```no_run
//! use std::sync::Arc;
//! use opendir_recon::{GlobalConfig, QueryConfig, Run};
//! use opendir_recon::fetch::{init_client, HttpFetcher};
//! use opendir_recon::output::OutputSink;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::default();
//! let query: QueryConfig = serde_json::from_str(r#"{"query": "autoindex"}"#)?;
//! let hosts = opendir_recon::index::extract_hosts_from_results("results.json")?;
//!
//! let sink = OutputSink::create(std::path::Path::new(&config.output_dir))?;
//! let fetcher = Arc::new(HttpFetcher::new(init_client(config.http_timeout_seconds)?));
//! let report = Run::new(&config, &query, fetcher, None, sink)
//!     .process_hosts(hosts)
//!     .await;
//! println!("online: {}", report.stats.online_hosts);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod detect;
pub mod fetch;
pub mod filter;
pub mod host;
pub mod index;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod run;
pub mod stats;
pub mod suppress;
pub mod walker;

pub use config::{load_queries, GlobalConfig, QueryConfig};
pub use host::Host;
pub use run::{Run, ScanReport};
