//! Persistent host blocklist.
//!
//! Hosts that repeatedly trip walk budgets get written to a blocklist
//! file and are never fetched again in later runs. Additions are hot-path
//! operations on worker tasks, so the file write happens on a dedicated
//! background task: adders fire a non-blocking signal, the saver debounces
//! bursts into a single write, and `close` guarantees a final save.
//!
//! File format: UTF-8 text, `#`-prefixed comment lines, one
//! `hostname RFC3339-timestamp` entry per line. A line carrying only a
//! hostname loads with the current time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BLOCKLIST_SAVE_DEBOUNCE;

struct BlocklistShared {
    /// hostname -> timestamp the host was blocked.
    hosts: RwLock<HashMap<String, DateTime<Utc>>>,
    file_path: PathBuf,
}

/// Persistent blocklist with a debounced background saver.
pub struct Blocklist {
    shared: Arc<BlocklistShared>,
    enabled: bool,
    save_tx: Option<mpsc::Sender<()>>,
    cancel: CancellationToken,
    saver: Mutex<Option<JoinHandle<()>>>,
}

impl Blocklist {
    /// Creates the blocklist and, when enabled, starts its save worker.
    ///
    /// Must be called within a tokio runtime when `enabled` is true.
    pub fn new(file_path: impl Into<PathBuf>, enabled: bool) -> Self {
        let shared = Arc::new(BlocklistShared {
            hosts: RwLock::new(HashMap::new()),
            file_path: file_path.into(),
        });
        let cancel = CancellationToken::new();

        let (save_tx, saver) = if enabled {
            // Capacity 1: a pending signal already guarantees a save, so
            // further signals can be dropped on the floor.
            let (tx, rx) = mpsc::channel(1);
            let handle = tokio::spawn(save_worker(Arc::clone(&shared), rx, cancel.clone()));
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        Blocklist {
            shared,
            enabled,
            save_tx,
            cancel,
            saver: Mutex::new(saver),
        }
    }

    /// Loads the blocklist file, if it exists.
    ///
    /// Returns the number of entries loaded. A missing file is an empty
    /// blocklist, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read.
    pub async fn load(&self) -> Result<usize> {
        if !self.enabled {
            log::debug!("Blocklist is disabled, skipping load");
            return Ok(0);
        }

        let path = &self.shared.file_path;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            log::info!(
                "Blocklist file does not exist, starting with empty blocklist: {}",
                path.display()
            );
            return Ok(0);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read blocklist file {}", path.display()))?;

        let mut hosts = self.shared.hosts.write().unwrap();
        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(hostname) = parts.next() else {
                continue;
            };
            let timestamp = parts
                .next()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            hosts.insert(hostname.to_string(), timestamp);
            count += 1;
        }

        log::info!("Loaded {} blocked hosts from {}", count, path.display());
        Ok(count)
    }

    /// Whether a base hostname is blocked.
    pub fn is_blocked(&self, hostname: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.shared.hosts.read().unwrap().contains_key(hostname)
    }

    /// Adds a base hostname, timestamped now, and signals the saver.
    ///
    /// Hosts are only ever added within a run, never removed.
    pub fn add_host(&self, hostname: &str) {
        if !self.enabled {
            return;
        }

        {
            let mut hosts = self.shared.hosts.write().unwrap();
            if hosts.contains_key(hostname) {
                return;
            }
            hosts.insert(hostname.to_string(), Utc::now());
        }
        log::info!("Added host to blocklist: {hostname}");

        if let Some(tx) = &self.save_tx {
            // Full channel means a save is already pending.
            let _ = tx.try_send(());
        }
    }

    /// Number of blocked hosts currently known.
    pub fn blocked_count(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.shared.hosts.read().unwrap().len()
    }

    /// Copy of the hostname set, for summaries and tests.
    pub fn blocked_hosts(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        self.shared.hosts.read().unwrap().keys().cloned().collect()
    }

    /// Stops the save worker, letting it flush any pending change first.
    pub async fn close(&self) {
        if !self.enabled {
            return;
        }
        self.cancel.cancel();
        let handle = self.saver.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                log::error!("Blocklist save worker panicked during shutdown");
            }
        }
        log::debug!("Blocklist closed");
    }
}

/// Background saver: debounces save signals and performs a final save on
/// shutdown when a change is still pending.
async fn save_worker(
    shared: Arc<BlocklistShared>,
    mut save_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    let mut pending = false;
    let mut deadline = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // A signal may still be queued in the channel; shutdown
                // must not lose it.
                if save_rx.try_recv().is_ok() {
                    pending = true;
                }
                if pending {
                    log::info!("Performing final blocklist save before shutdown");
                    if let Err(error) = save_snapshot(&shared).await {
                        log::error!("Failed to save blocklist on shutdown: {error}");
                    }
                }
                return;
            }
            received = save_rx.recv() => {
                match received {
                    Some(()) => {
                        // First signal arms the debounce window; signals
                        // landing inside the window are already covered.
                        if !pending {
                            pending = true;
                            deadline = tokio::time::Instant::now() + BLOCKLIST_SAVE_DEBOUNCE;
                        }
                    }
                    None => {
                        if pending {
                            if let Err(error) = save_snapshot(&shared).await {
                                log::error!("Failed to save blocklist: {error}");
                            }
                        }
                        return;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline), if pending => {
                if let Err(error) = save_snapshot(&shared).await {
                    log::error!("Failed to save blocklist: {error}");
                }
                pending = false;
            }
        }
    }
}

/// Snapshots the map under the read lock, then writes the file without
/// holding any lock.
async fn save_snapshot(shared: &BlocklistShared) -> Result<()> {
    let mut entries: Vec<(String, DateTime<Utc>)> = {
        let hosts = shared.hosts.read().unwrap();
        hosts
            .iter()
            .map(|(hostname, timestamp)| (hostname.clone(), *timestamp))
            .collect()
    };
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut content = String::new();
    content.push_str(&format!(
        "# opendir_recon blocklist - generated on {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    content.push_str("# Format: hostname timestamp\n");
    content.push_str("# Hosts that exceeded skip limits and are permanently blocked\n\n");
    for (hostname, timestamp) in &entries {
        content.push_str(&format!(
            "{} {}\n",
            hostname,
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }

    tokio::fs::write(&shared.file_path, content)
        .await
        .with_context(|| {
            format!(
                "failed to write blocklist file {}",
                shared.file_path.display()
            )
        })?;
    log::info!(
        "Saved {} blocked hosts to {}",
        entries.len(),
        shared.file_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn blocklist_path(dir: &TempDir) -> PathBuf {
        dir.path().join("blocklist.txt")
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let blocklist = Blocklist::new(blocklist_path(&dir), true);
        let loaded = blocklist.load().await.expect("load");
        assert_eq!(loaded, 0);
        assert_eq!(blocklist.blocked_count(), 0);
        blocklist.close().await;
    }

    #[tokio::test]
    async fn test_load_skips_comments_and_blanks() {
        let dir = TempDir::new().expect("tempdir");
        let path = blocklist_path(&dir);
        std::fs::write(
            &path,
            "# header\n\nevil.test 2025-01-15T10:30:00Z\n# trailing comment\nbare.test\n",
        )
        .expect("write fixture");

        let blocklist = Blocklist::new(&path, true);
        let loaded = blocklist.load().await.expect("load");
        assert_eq!(loaded, 2);
        assert!(blocklist.is_blocked("evil.test"));
        assert!(blocklist.is_blocked("bare.test"), "timestamp-less line loads");
        assert!(!blocklist.is_blocked("good.test"));
        blocklist.close().await;
    }

    #[tokio::test]
    async fn test_disabled_blocklist_blocks_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let path = blocklist_path(&dir);
        std::fs::write(&path, "evil.test 2025-01-15T10:30:00Z\n").expect("write fixture");

        let blocklist = Blocklist::new(&path, false);
        assert_eq!(blocklist.load().await.expect("load"), 0);
        assert!(!blocklist.is_blocked("evil.test"));
        blocklist.add_host("other.test");
        assert_eq!(blocklist.blocked_count(), 0);
        blocklist.close().await;
    }

    #[tokio::test]
    async fn test_close_performs_final_save() {
        let dir = TempDir::new().expect("tempdir");
        let path = blocklist_path(&dir);
        let blocklist = Blocklist::new(&path, true);

        blocklist.add_host("a.test");
        blocklist.add_host("b.test");
        // Close before the debounce window expires: the final save must
        // still capture both hosts.
        blocklist.close().await;

        let content = std::fs::read_to_string(&path).expect("file written on close");
        assert!(content.contains("a.test "));
        assert!(content.contains("b.test "));
        assert!(content.starts_with('#'), "header comment expected");
    }

    #[tokio::test]
    async fn test_debounced_save_happens_without_close() {
        let dir = TempDir::new().expect("tempdir");
        let path = blocklist_path(&dir);
        let blocklist = Blocklist::new(&path, true);

        blocklist.add_host("burst1.test");
        blocklist.add_host("burst2.test");
        tokio::time::sleep(BLOCKLIST_SAVE_DEBOUNCE + std::time::Duration::from_millis(200)).await;

        let content = std::fs::read_to_string(&path).expect("debounced save");
        assert!(content.contains("burst1.test"));
        assert!(content.contains("burst2.test"));
        blocklist.close().await;
    }

    #[tokio::test]
    async fn test_hosts_are_monotonic_within_a_run() {
        let dir = TempDir::new().expect("tempdir");
        let blocklist = Blocklist::new(blocklist_path(&dir), true);
        blocklist.add_host("x.test");
        blocklist.add_host("x.test");
        assert_eq!(blocklist.blocked_count(), 1);
        blocklist.close().await;
    }

    #[tokio::test]
    async fn test_round_trip_preserves_hostnames() {
        let dir = TempDir::new().expect("tempdir");
        let first_path = blocklist_path(&dir);
        std::fs::write(
            &first_path,
            "one.test 2025-01-15T10:30:00Z\ntwo.test 2025-02-20T08:00:00Z\n",
        )
        .expect("write fixture");

        let first = Blocklist::new(&first_path, true);
        first.load().await.expect("load");
        let mut loaded = first.blocked_hosts();
        loaded.sort();
        first.close().await;

        // Save through a second instance to a different path.
        let second_path = dir.path().join("copy.txt");
        let second = Blocklist::new(&second_path, true);
        second.load().await.expect("empty load");
        for host in &loaded {
            second.add_host(host);
        }
        second.close().await;

        let reread = Blocklist::new(&second_path, true);
        let count = reread.load().await.expect("reload");
        assert_eq!(count, 2);
        let mut reloaded = reread.blocked_hosts();
        reloaded.sort();
        assert_eq!(reloaded, loaded);
        reread.close().await;
    }
}
