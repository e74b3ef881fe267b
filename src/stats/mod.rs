//! Scan statistics.
//!
//! All run counters live behind a single mutex; workers take it only for
//! the duration of one increment. [`ScanStats::snapshot`] returns a plain
//! copy for the end-of-run summary.

use std::sync::Mutex;

/// Counter snapshot returned by [`ScanStats::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_hosts: usize,
    pub online_hosts: usize,
    pub total_files: usize,
    pub filtered_files: usize,
    /// Probe attempts, counted once per probe call.
    pub checked_files: usize,
    pub binary_files_found: usize,
    pub write_errors: usize,
}

/// Shared, mutex-protected scan counters.
#[derive(Debug, Default)]
pub struct ScanStats {
    inner: Mutex<StatsSnapshot>,
}

impl ScanStats {
    pub fn new() -> Self {
        ScanStats::default()
    }

    /// Records the host count. Set once, before processing starts.
    pub fn set_total_hosts(&self, count: usize) {
        self.inner.lock().unwrap().total_hosts = count;
    }

    pub fn record_online_host(&self) {
        self.inner.lock().unwrap().online_hosts += 1;
    }

    pub fn record_file(&self) {
        self.inner.lock().unwrap().total_files += 1;
    }

    pub fn record_filtered_file(&self) {
        self.inner.lock().unwrap().filtered_files += 1;
    }

    /// Records one probe attempt.
    pub fn record_checked_file(&self) {
        self.inner.lock().unwrap().checked_files += 1;
    }

    pub fn record_binary_file(&self) {
        self.inner.lock().unwrap().binary_files_found += 1;
    }

    pub fn record_write_error(&self) {
        self.inner.lock().unwrap().write_errors += 1;
    }

    /// Returns a copy of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = ScanStats::new();
        stats.set_total_hosts(4);
        stats.record_online_host();
        stats.record_file();
        stats.record_file();
        stats.record_filtered_file();
        stats.record_checked_file();
        stats.record_binary_file();
        stats.record_write_error();

        let snap = stats.snapshot();
        assert_eq!(snap.total_hosts, 4);
        assert_eq!(snap.online_hosts, 1);
        assert_eq!(snap.total_files, 2);
        assert_eq!(snap.filtered_files, 1);
        assert_eq!(snap.checked_files, 1);
        assert_eq!(snap.binary_files_found, 1);
        assert_eq!(snap.write_errors, 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(ScanStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.record_file();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(stats.snapshot().total_files, 8000);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = ScanStats::new();
        let before = stats.snapshot();
        stats.record_online_host();
        // The earlier snapshot must not observe the later increment.
        assert_eq!(before.online_hosts, 0);
        assert_eq!(stats.snapshot().online_hosts, 1);
    }
}
