//! Host suppression.
//!
//! Two tiers keep the crawler away from hosts that waste its budgets:
//!
//! - **in-run**: skip counters per base hostname, a set of blocked base
//!   hostnames and a set of skipped host URLs, all scoped to one run;
//! - **cross-run**: the persistent [`Blocklist`], consulted before any
//!   fetch and extended when a base host accumulates enough skip events.

mod blocklist;

pub use blocklist::Blocklist;

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::{DashMap, DashSet};

use crate::host::base_host;

/// In-run skip tracking plus the persistent blocklist.
pub struct SuppressionManager {
    /// Exact host URLs whose walk was aborted after a block promotion.
    skipped_hosts: DashSet<String>,
    /// Base hostnames promoted to blocked during this run.
    blocked: DashSet<String>,
    /// Skip events per base hostname.
    skip_counters: DashMap<String, AtomicI64>,
    blocklist: Blocklist,
    max_skips_before_block: i64,
}

impl SuppressionManager {
    pub fn new(blocklist: Blocklist, max_skips_before_block: i64) -> Self {
        SuppressionManager {
            skipped_hosts: DashSet::new(),
            blocked: DashSet::new(),
            skip_counters: DashMap::new(),
            blocklist,
            max_skips_before_block,
        }
    }

    /// Loads the persistent blocklist; see [`Blocklist::load`].
    ///
    /// # Errors
    ///
    /// Propagates a read failure of an existing blocklist file.
    pub async fn load(&self) -> anyhow::Result<usize> {
        self.blocklist.load().await
    }

    /// Whether the base hostname is in the persistent blocklist.
    pub fn is_blocked_persistent(&self, base: &str) -> bool {
        self.blocklist.is_blocked(base)
    }

    /// Whether the base hostname was promoted to blocked this run.
    pub fn is_base_blocked(&self, base: &str) -> bool {
        self.blocked.contains(base)
    }

    /// Whether this exact host URL was marked skipped this run.
    pub fn is_url_skipped(&self, url: &str) -> bool {
        self.skipped_hosts.contains(url)
    }

    /// Records one skip event.
    ///
    /// `skip_url` is the URL whose subtree was abandoned; its base
    /// hostname takes the skip count. Once the count reaches the
    /// threshold, the base hostname is blocked for the rest of the run,
    /// added to the persistent blocklist, and `origin_url` (the host the
    /// walk started from) is marked skipped.
    pub fn record_skip(&self, skip_url: &str, origin_url: &str) {
        let base = base_host(skip_url);
        log::info!("Marking host for skip due to link limit: {skip_url}");

        let count = {
            let counter = self
                .skip_counters
                .entry(base.clone())
                .or_insert_with(|| AtomicI64::new(0));
            counter.fetch_add(1, Ordering::SeqCst) + 1
        };
        log::debug!("Skip count for base host {base}: {count}");

        if self.max_skips_before_block > 0 && count >= self.max_skips_before_block {
            log::info!("Blocking entire base host after {count} skips: {base}");
            self.blocked.insert(base.clone());
            self.blocklist.add_host(&base);
            self.skipped_hosts.insert(origin_url.to_string());
        }
    }

    /// Hostnames currently in the persistent blocklist.
    pub fn persistent_hosts(&self) -> Vec<String> {
        self.blocklist.blocked_hosts()
    }

    /// Shuts down the blocklist saver, flushing pending changes.
    pub async fn close(&self) {
        self.blocklist.close().await;
    }
}
