//! Application configuration.
//!
//! Two layers of policy drive a scan:
//!
//! - [`GlobalConfig`] - process-wide budgets and paths, loaded from a JSON
//!   config file.
//! - [`QueryConfig`] - per-query policy (filters, recursion, targeted file
//!   checking), loaded from a query catalog file or built from CLI flags.

mod constants;

pub use constants::*;

use std::path::{Component, Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Process-wide configuration: budgets, concurrency and file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// Directory receiving `raw.txt`, `filtered.txt` and `binary_found.txt`.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Total HTTP request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// Number of concurrent host workers.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default)]
    pub log_level: String,

    /// Optional log file; empty means stderr only.
    #[serde(default)]
    pub log_file: String,

    /// Per-directory link cap during recursive walks. `0` disables the cap.
    #[serde(default)]
    pub max_links_per_directory: usize,

    /// Per-host total link budget across the whole recursive walk.
    /// `0` disables the budget.
    #[serde(default)]
    pub max_total_links: usize,

    /// Skip events after which a base host is promoted to the persistent
    /// blocklist. `0` means never promote.
    #[serde(default)]
    pub max_skips_before_block: i64,

    /// Persistent blocklist file path.
    #[serde(default = "default_blocklist_file")]
    pub blocklist_file: String,

    /// Whether the persistent blocklist is consulted and maintained.
    #[serde(default)]
    pub enable_blocklist: bool,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_blocklist_file() -> String {
    DEFAULT_BLOCKLIST_FILE.to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            output_dir: default_output_dir(),
            http_timeout_seconds: default_http_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            log_level: String::new(),
            log_file: String::new(),
            max_links_per_directory: 0,
            max_total_links: 0,
            max_skips_before_block: 0,
            blocklist_file: default_blocklist_file(),
            enable_blocklist: false,
        }
    }
}

impl GlobalConfig {
    /// Loads and validates the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails (see [`GlobalConfig::validate`]).
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: GlobalConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates budgets and paths, creating the output directory when it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive timeout or concurrency, an
    /// empty or traversal-containing output directory, or when the output
    /// directory cannot be created.
    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_seconds == 0 {
            bail!("http_timeout_seconds must be greater than 0");
        }
        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be greater than 0");
        }
        if self.output_dir.is_empty() {
            bail!("output_dir cannot be empty");
        }
        if Path::new(&self.output_dir)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            bail!("output_dir contains invalid path traversal sequence");
        }
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create output directory {}", self.output_dir))?;
        Ok(())
    }
}

/// Per-query policy: what to search for and how to treat the findings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Human-readable name shown in the summary.
    #[serde(default)]
    pub name: String,

    /// Scan-index query text. Opaque to the crawler.
    pub query: String,

    /// File extensions routed to `filtered.txt` (e.g. `[".pdf", "exe"]`;
    /// the leading dot is optional).
    #[serde(default)]
    pub filters: Vec<String>,

    /// Enables content-type probing of candidate files.
    #[serde(default)]
    pub check: bool,

    /// When set together with `check`, each host is probed for this exact
    /// filename before any directory walking.
    #[serde(default)]
    pub target_filename: String,

    /// `"yes"` enables recursive directory walking.
    #[serde(default = "default_recursive")]
    pub recursive: String,

    /// Maximum walk depth; meaningful only when `recursive` is `"yes"`.
    #[serde(default = "default_max_depth", rename = "max-depth")]
    pub max_depth: usize,
}

fn default_recursive() -> String {
    "no".to_string()
}

fn default_max_depth() -> usize {
    1
}

impl QueryConfig {
    /// Whether recursive walking is enabled for this query.
    pub fn is_recursive(&self) -> bool {
        self.recursive == "yes"
    }
}

/// Loads the query catalog (a JSON array of [`QueryConfig`]) from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn load_queries(path: &str) -> Result<Vec<QueryConfig>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read queries file {path}"))?;
    let queries: Vec<QueryConfig> = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse queries file {path}"))?;
    log::info!("Loaded {} queries from {}", queries.len(), path);
    Ok(queries)
}
