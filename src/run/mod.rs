//! Scan orchestration.
//!
//! A [`Run`] owns every shared scan component - sink, suppression state,
//! statistics, the per-host pipeline - and is created fresh per
//! invocation; nothing here outlives the run. [`Run::process_hosts`] is
//! the dispatcher: it fans the host list out over a bounded worker pool,
//! drains it, appends the scan summary and shuts the components down in
//! order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::app::log_progress;
use crate::config::{GlobalConfig, QueryConfig, PROGRESS_LOG_INTERVAL};
use crate::fetch::Fetcher;
use crate::filter::FileFilter;
use crate::host::Host;
use crate::output::summary::{format_summary, SummaryParams};
use crate::output::OutputSink;
use crate::pipeline::HostPipeline;
use crate::probe::Prober;
use crate::stats::{ScanStats, StatsSnapshot};
use crate::suppress::{Blocklist, SuppressionManager};
use crate::walker::{DirectoryWalker, WalkBudgets};

/// Results of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Final counter values.
    pub stats: StatsSnapshot,
    /// Wall-clock duration in seconds.
    pub elapsed_seconds: f64,
}

/// One scan invocation: owned components plus the query policy.
pub struct Run {
    pipeline: Arc<HostPipeline>,
    suppression: Arc<SuppressionManager>,
    sink: Arc<OutputSink>,
    stats: Arc<ScanStats>,
    max_concurrent: usize,
    query_text: String,
    check_enabled: bool,
    target_filename: String,
    filters: Vec<String>,
    binary_output_path: String,
}

impl Run {
    /// Assembles a run from its injected capabilities.
    ///
    /// `fetcher` and `prober` are trait objects so tests can freeze the
    /// network surface; `sink` is taken by value and owned by the run.
    /// Must be called within a tokio runtime when the blocklist is
    /// enabled (the blocklist spawns its save worker).
    pub fn new(
        config: &GlobalConfig,
        query: &QueryConfig,
        fetcher: Arc<dyn Fetcher>,
        prober: Option<Arc<dyn Prober>>,
        sink: OutputSink,
    ) -> Self {
        let sink = Arc::new(sink);
        let stats = Arc::new(ScanStats::new());
        let blocklist = Blocklist::new(&config.blocklist_file, config.enable_blocklist);
        let suppression = Arc::new(SuppressionManager::new(
            blocklist,
            config.max_skips_before_block,
        ));
        let filter = FileFilter::new(&query.filters);
        let filters = filter.extensions();

        let pipeline = Arc::new(HostPipeline {
            fetcher,
            prober,
            walker: DirectoryWalker::new(),
            filter,
            suppression: Arc::clone(&suppression),
            sink: Arc::clone(&sink),
            stats: Arc::clone(&stats),
            check_enabled: query.check,
            target_filename: query.target_filename.clone(),
            recursive: query.is_recursive(),
            max_depth: query.max_depth,
            budgets: WalkBudgets {
                max_links_per_directory: config.max_links_per_directory,
                max_total_links: config.max_total_links,
            },
        });

        Run {
            pipeline,
            suppression,
            sink,
            stats,
            max_concurrent: config.max_concurrent_requests,
            query_text: query.query.clone(),
            check_enabled: query.check,
            target_filename: query.target_filename.clone(),
            filters,
            binary_output_path: format!("{}/binary_found.txt", config.output_dir),
        }
    }

    /// Processes every host under the configured concurrency, then
    /// appends the scan summary and closes the suppression manager and
    /// the output sink.
    ///
    /// Hosts are processed in no particular order; a failure inside one
    /// host pipeline never affects the others.
    pub async fn process_hosts(&self, hosts: Vec<Host>) -> ScanReport {
        let start_time = Local::now();
        let started = Instant::now();
        let total = hosts.len();

        log::info!("Starting to process {total} hosts");
        self.stats.set_total_hosts(total);

        if let Err(error) = self.suppression.load().await {
            log::error!("Failed to load blocklist: {error:#}");
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for host in hosts {
            // Reap finished tasks before spawning more so JoinHandles do
            // not pile up on large host lists.
            while let Ok(Some(result)) =
                tokio::time::timeout(std::time::Duration::ZERO, tasks.join_next()).await
            {
                if let Err(join_error) = result {
                    log::warn!("Host task panicked: {join_error:?}");
                }
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    log::warn!("Worker semaphore closed, skipping host: {}", host.url);
                    continue;
                }
            };

            let pipeline = Arc::clone(&self.pipeline);
            let completed = Arc::clone(&completed);
            tasks.spawn(async move {
                let _permit = permit;
                pipeline.process(&host).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if done % PROGRESS_LOG_INTERVAL == 0 {
                    log_progress(done, total, started);
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(join_error) = result {
                log::warn!("Host task panicked: {join_error:?}");
            }
        }
        log::info!("Finished processing all hosts");

        self.suppression.close().await;
        self.finish(start_time, started)
    }

    /// Appends the summary (and a write-error warning when needed) to the
    /// raw stream, closes the sink, and builds the report.
    fn finish(&self, start_time: chrono::DateTime<Local>, started: Instant) -> ScanReport {
        let end_time = Local::now();
        let summary = format_summary(&SummaryParams {
            query: &self.query_text,
            stats: self.stats.snapshot(),
            filters: &self.filters,
            start_time,
            end_time,
            check_enabled: self.check_enabled,
            target_filename: &self.target_filename,
            binary_output_path: &self.binary_output_path,
        });
        log::info!("\n{summary}");
        if let Err(error) = self.sink.write_raw(&format!("\n{summary}")) {
            log::error!("Failed to write summary to raw output: {error}");
            self.stats.record_write_error();
        }

        let write_errors = self.stats.snapshot().write_errors;
        if write_errors > 0 {
            let warning = format!(
                "WARNING: {write_errors} file write errors occurred during execution!\n\
                 Some results may not have been saved to output files."
            );
            log::error!("{warning}");
            let _ = self.sink.write_raw(&warning);
        }

        if let Err(error) = self.sink.close() {
            log::error!("Failed to close output sink: {error}");
            self.stats.record_write_error();
        }

        ScanReport {
            stats: self.stats.snapshot(),
            elapsed_seconds: started.elapsed().as_secs_f64(),
        }
    }
}
