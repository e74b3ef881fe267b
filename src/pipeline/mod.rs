//! Per-host processing.
//!
//! One [`HostPipeline::process`] call takes a host from suppression
//! pre-flight through fetch, listing detection, the optional targeted
//! file probe, the directory walk and per-file handling. The pipeline is
//! the only component that closes over suppression state; the walker and
//! probe are injected capabilities.

use std::collections::HashSet;
use std::sync::Arc;

use crate::fetch::Fetcher;
use crate::filter::FileFilter;
use crate::host::{base_host, Host};
use crate::output::OutputSink;
use crate::probe::Prober;
use crate::stats::ScanStats;
use crate::suppress::SuppressionManager;
use crate::walker::{DirectoryWalker, WalkBudgets};

/// Per-host orchestration over the injected scan components.
pub struct HostPipeline {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) prober: Option<Arc<dyn Prober>>,
    pub(crate) walker: DirectoryWalker,
    pub(crate) filter: FileFilter,
    pub(crate) suppression: Arc<SuppressionManager>,
    pub(crate) sink: Arc<OutputSink>,
    pub(crate) stats: Arc<ScanStats>,
    pub(crate) check_enabled: bool,
    pub(crate) target_filename: String,
    pub(crate) recursive: bool,
    pub(crate) max_depth: usize,
    pub(crate) budgets: WalkBudgets,
}

impl HostPipeline {
    /// Processes a single host end to end. Never fails: every error is
    /// logged or counted and the worker moves on.
    pub async fn process(&self, host: &Host) {
        log::debug!("Processing host: {}", host.url);

        let base = base_host(&host.url);
        if self.suppression.is_blocked_persistent(&base) {
            log::info!("Skipping host - in persistent blocklist: {}", host.url);
            return;
        }
        if self.suppression.is_base_blocked(&base) {
            log::info!("Skipping host - base host is blocked: {}", host.url);
            return;
        }
        if self.suppression.is_url_skipped(&host.url) {
            log::info!("Skipping host due to previous limit exceeded: {}", host.url);
            return;
        }

        let outcome = match self.fetcher.check_and_fetch(&host.url).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!("Error checking host {}: {error:#}", host.url);
                return;
            }
        };
        if !outcome.online {
            log::debug!("Host is offline: {}", host.url);
            return;
        }

        self.stats.record_online_host();
        self.write_raw(&host.url);

        if outcome.body.is_empty() {
            return;
        }

        let mut targeted_check_mode = false;
        let mut found_target_file = false;
        if self.check_enabled && !self.target_filename.is_empty() {
            if let Some(prober) = &self.prober {
                targeted_check_mode = true;
                found_target_file = self.probe_target_file(prober.as_ref(), host).await;
            }
        }

        // A confirmed target file makes the rest of the host redundant.
        if !(targeted_check_mode && found_target_file) {
            self.process_directory(host, &outcome.body).await;
        }
    }

    /// Probes the host for the configured target filename. Returns true
    /// when the file exists and is binary.
    async fn probe_target_file(&self, prober: &dyn Prober, host: &Host) -> bool {
        log::debug!(
            "Checking for specific file {} at {}",
            self.target_filename,
            host.url
        );

        self.stats.record_checked_file();
        match prober.check_specific(&host.url, &self.target_filename).await {
            Ok(finding) if finding.is_binary => {
                log::info!(
                    "Found binary file '{}' at {} with Content-Type: {}",
                    self.target_filename,
                    host.url,
                    finding.content_type
                );
                let binary_line = format!(
                    "{}/{} with Content-Type: {}",
                    host.url.trim_end_matches('/'),
                    self.target_filename,
                    finding.content_type
                );
                self.write_raw(&format!("Found binary file: {binary_line}"));
                self.write_binary(&binary_line);
                self.stats.record_binary_file();
                true
            }
            Ok(finding) => {
                log::debug!(
                    "Target file at {} is not binary (Content-Type: {})",
                    host.url,
                    finding.content_type
                );
                false
            }
            Err(error) => {
                log::debug!("Failed to check for specific file: {error:#}");
                false
            }
        }
    }

    /// Walks the host's directory listing and handles every found file.
    async fn process_directory(&self, host: &Host, body: &str) {
        let base = base_host(&host.url);
        if self.suppression.is_blocked_persistent(&base) || self.suppression.is_base_blocked(&base)
        {
            log::debug!("Skipping directory processing - host blocked: {}", host.url);
            return;
        }

        if !self.walker.is_listing(body) {
            log::debug!("Host content is not a directory listing: {}", host.url);
            return;
        }

        let file_urls = if self.recursive && self.max_depth > 1 {
            log::info!(
                "Starting recursive scan with max-depth {} for {}",
                self.max_depth,
                host.url
            );
            let suppression = Arc::clone(&self.suppression);
            let origin_url = host.url.clone();
            let on_skip = move |skip_url: &str| suppression.record_skip(skip_url, &origin_url);
            self.walker
                .scan_recursive(
                    &host.url,
                    body,
                    self.max_depth,
                    self.fetcher.as_ref(),
                    self.budgets,
                    &on_skip,
                )
                .await
        } else {
            log::debug!("Using flat directory scan for {}", host.url);
            self.walker.scan(&host.url, body)
        };

        // Per-host deduplication; the set dies with this call.
        let mut seen: HashSet<String> = HashSet::new();
        for file_url in file_urls {
            self.process_found_file(&mut seen, &file_url).await;
        }
    }

    /// Handles one walked file URL: dedup, raw output, filtering and the
    /// optional content probe.
    async fn process_found_file(&self, seen: &mut HashSet<String>, file_url: &str) {
        if !seen.insert(file_url.to_string()) {
            log::debug!("Skipping duplicate URL: {file_url}");
            return;
        }

        self.stats.record_file();
        self.write_raw(&format!("Found file: {file_url}"));

        if !self.filter.should_filter(file_url) {
            return;
        }
        log::debug!("File matched filter: {file_url}");
        self.stats.record_filtered_file();
        self.write_filtered(file_url);

        if self.check_enabled {
            if let Some(prober) = &self.prober {
                if prober.should_check(file_url) {
                    self.check_file_content(prober.as_ref(), file_url).await;
                }
            }
        }
    }

    /// Probes a filtered file for binary content.
    async fn check_file_content(&self, prober: &dyn Prober, file_url: &str) {
        self.stats.record_checked_file();
        match prober.check_url(file_url).await {
            Ok(finding) if finding.is_binary => {
                log::info!(
                    "Found binary file at {file_url} with Content-Type: {}",
                    finding.content_type
                );
                self.write_raw(&format!(
                    "Found binary file: {file_url} with Content-Type: {}",
                    finding.content_type
                ));
                self.write_binary(&format!(
                    "{file_url} with Content-Type: {}",
                    finding.content_type
                ));
                self.stats.record_binary_file();
            }
            Ok(_) => {}
            Err(error) => {
                log::debug!("File check failed for {file_url}: {error:#}");
            }
        }
    }

    fn write_raw(&self, line: &str) {
        if let Err(error) = self.sink.write_raw(line) {
            log::error!("Failed to write to raw output: {error}");
            self.stats.record_write_error();
        }
    }

    fn write_filtered(&self, line: &str) {
        if let Err(error) = self.sink.write_filtered(line) {
            log::error!("Failed to write to filtered output: {error}");
            self.stats.record_write_error();
        }
    }

    fn write_binary(&self, line: &str) {
        if let Err(error) = self.sink.write_binary(line) {
            log::error!("Failed to write to binary output: {error}");
            self.stats.record_write_error();
        }
    }
}
