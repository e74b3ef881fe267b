//! Recursive directory walking.
//!
//! The walker turns directory-listing HTML into file URLs. The recursive
//! variant descends into subdirectories under three bounds: a maximum
//! depth, a per-directory link cap, and a per-host total-links budget
//! tracked by an atomic counter. Tripping the total budget abandons the
//! subtree and reports the event through the injected skip callback; the
//! walker itself knows nothing about suppression policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use futures::future::BoxFuture;
use futures::FutureExt;
use scraper::{Html, Selector};
use url::Url;

use crate::detect::{ListingDetector, NAVIGATION_HREFS};
use crate::fetch::Fetcher;

/// Size bounds for one recursive walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkBudgets {
    /// Links kept per directory, in document order. `0` disables the cap.
    pub max_links_per_directory: usize,
    /// Total links across the whole walk. `0` disables the budget.
    pub max_total_links: usize,
}

/// Callback invoked with the URL whose subtree was abandoned over budget.
pub type SkipReporter<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Bounded link extractor for open directory listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWalker {
    detector: ListingDetector,
}

impl DirectoryWalker {
    pub fn new() -> Self {
        DirectoryWalker {
            detector: ListingDetector::new(),
        }
    }

    /// Whether a body classifies as a directory listing; delegates to
    /// the walker's [`ListingDetector`].
    pub fn is_listing(&self, body: &str) -> bool {
        self.detector.is_listing(body)
    }

    /// Extracts all links from one listing body, without recursion.
    pub fn scan(&self, url: &str, body: &str) -> Vec<String> {
        let links = extract_links(url, body);
        log::debug!("Directory scan found {} links for {}", links.len(), url);
        links
    }

    /// Walks a listing recursively, returning every file-typed link
    /// encountered, flattened in visit order.
    ///
    /// `fetcher` retrieves subdirectory bodies; `on_skip` fires whenever
    /// the total-links budget forces a subtree to be abandoned. A
    /// `max_depth` of zero degrades to the flat [`DirectoryWalker::scan`].
    pub async fn scan_recursive(
        &self,
        url: &str,
        body: &str,
        max_depth: usize,
        fetcher: &dyn Fetcher,
        budgets: WalkBudgets,
        on_skip: SkipReporter<'_>,
    ) -> Vec<String> {
        if max_depth == 0 {
            return self.scan(url, body);
        }

        let mut walk = Walk {
            detector: self.detector,
            fetcher,
            budgets,
            on_skip,
            max_depth,
            total_links: AtomicI64::new(0),
            visited: HashSet::new(),
            files: Vec::new(),
        };
        walk.visit(url.to_string(), body.to_string(), 0).await;
        walk.files
    }
}

/// State of one recursive walk. Thread-confined to the worker running
/// the host; only the links counter is shared-safe, matching how budget
/// checks interleave with descent.
struct Walk<'a> {
    detector: ListingDetector,
    fetcher: &'a dyn Fetcher,
    budgets: WalkBudgets,
    on_skip: SkipReporter<'a>,
    max_depth: usize,
    total_links: AtomicI64,
    visited: HashSet<String>,
    files: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, url: String, body: String, depth: usize) -> BoxFuture<'_, ()> {
        async move {
            // Budget first: a node entered after the budget tripped is
            // abandoned wholesale, including the not-yet-visited check.
            let current = self.total_links.load(Ordering::SeqCst);
            if self.budgets.max_total_links > 0 && current > self.budgets.max_total_links as i64 {
                log::info!(
                    "Walk reached total links budget ({current} > {}), abandoning {url}",
                    self.budgets.max_total_links
                );
                (self.on_skip)(&url);
                return;
            }

            if self.visited.contains(&url) || depth >= self.max_depth {
                log::debug!(
                    "Skipping {url}: visited={}, depth={depth}/{}",
                    self.visited.contains(&url),
                    self.max_depth
                );
                return;
            }
            self.visited.insert(url.clone());

            let mut links = extract_links(&url, &body);
            log::debug!("Found {} raw links at depth {depth} under {url}", links.len());

            let cap = self.budgets.max_links_per_directory;
            if cap > 0 && links.len() > cap {
                log::info!("Directory has {} links, limiting to {cap}", links.len());
                links.truncate(cap);
            }

            let (directories, files): (Vec<String>, Vec<String>) =
                links.into_iter().partition(|link| is_directory_link(link));
            log::debug!(
                "Link separation under {url}: {} files, {} directories",
                files.len(),
                directories.len()
            );

            self.total_links
                .fetch_add(files.len() as i64, Ordering::SeqCst);
            self.files.extend(files);

            if depth + 1 < self.max_depth {
                for dir_url in directories {
                    let outcome = match self.fetcher.check_and_fetch(&dir_url).await {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            log::debug!("Failed to fetch directory {dir_url}: {error}");
                            continue;
                        }
                    };
                    if !outcome.online {
                        log::debug!("Directory offline: {dir_url}");
                        continue;
                    }
                    if self.detector.is_listing(&outcome.body) {
                        self.visit(dir_url, outcome.body, depth + 1).await;
                    } else {
                        log::debug!("Not a directory listing, skipping: {dir_url}");
                    }
                }
            }
        }
        .boxed()
    }
}

/// Extracts anchor hrefs from a listing body, resolved against the
/// currently-walked URL. Navigation hrefs are dropped, document order is
/// preserved and duplicates are kept; deduplication is a per-host concern
/// of the pipeline.
fn extract_links(base_url: &str, body: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        log::debug!("Failed to parse base URL: {base_url}");
        return Vec::new();
    };

    let document = Html::parse_document(body);
    let selector = Selector::parse("a").expect("static selector");

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if NAVIGATION_HREFS.contains(&href) {
            continue;
        }
        match base.join(href) {
            Ok(resolved) => links.push(resolved.to_string()),
            Err(_) => log::debug!("Skipping malformed href: {href}"),
        }
    }
    links
}

/// Directory heuristic: a trailing slash, or a final path segment
/// without a dot.
fn is_directory_link(link: &str) -> bool {
    if link.ends_with('/') {
        return true;
    }
    let last_segment = link.rsplit('/').next().unwrap_or("");
    !last_segment.is_empty() && !last_segment.contains('.')
}
