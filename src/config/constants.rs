//! Configuration constants.
//!
//! This module defines the operational constants used throughout the
//! application: timeouts, size limits, buffer sizes and other defaults.

use std::time::Duration;

/// Default maximum concurrent host workers.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// TCP connection timeout in seconds.
///
/// Kept short so dead hosts fail fast instead of consuming a worker for
/// the whole request timeout.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum response body size in bytes (50 MiB).
///
/// Directory indexes are normally a few KiB; anything approaching this
/// limit is either not a listing or a deliberately hostile response.
/// Bodies are streamed and the read is aborted once the limit is hit.
pub const MAX_RESPONSE_BODY_SIZE: usize = 50 * 1024 * 1024;

/// Number of body bytes read when probing a candidate file.
///
/// Enough to confirm the server actually produces content for the URL
/// without downloading the file.
pub const PROBE_BODY_READ_LIMIT: usize = 512;

/// Output stream buffer size in bytes (64 KiB).
///
/// The default `BufWriter` capacity causes frequent flushes when many
/// workers emit findings; 64 KiB keeps write syscalls rare.
pub const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Debounce window for persistent blocklist saves.
///
/// Skip events arrive in bursts when a host trips its budget across
/// several directories; coalescing them into one write per window keeps
/// the saver from rewriting the file per event.
pub const BLOCKLIST_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Number of completed hosts between progress log lines.
pub const PROGRESS_LOG_INTERVAL: usize = 10;

/// User-Agent sent with every request.
///
/// A desktop browser string; plenty of exposed servers return different
/// (or no) content to obvious bot agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Accept header preferring HTML.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Anchor-count threshold above which a page is classified as a listing
/// even without any textual indicator.
pub const LISTING_ANCHOR_THRESHOLD: usize = 5;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Default persistent blocklist path.
pub const DEFAULT_BLOCKLIST_FILE: &str = "./blocklist.txt";
