//! Small shared application helpers.

use std::time::Instant;

/// Logs a progress line with the current processing rate.
pub fn log_progress(completed: usize, total: usize, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        completed as f64 / elapsed
    } else {
        0.0
    };
    log::info!("Progress: {completed}/{total} hosts processed ({rate:.1} hosts/sec)");
}
