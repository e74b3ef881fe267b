//! Command-line entry point.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use opendir_recon::fetch::{init_client, HttpFetcher};
use opendir_recon::output::OutputSink;
use opendir_recon::probe::{ContentProbe, Prober};
use opendir_recon::{load_queries, GlobalConfig, QueryConfig, Run};

/// Open directory reconnaissance crawler for Internet-scan index results.
#[derive(Parser, Debug)]
#[command(name = "opendir-recon", version, about)]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "./config.json")]
    config: String,

    /// Path to the exported scan-index results (JSON array)
    #[arg(long)]
    hosts: String,

    /// Path to the query catalog file
    #[arg(long, default_value = "./queries.json")]
    queries: String,

    /// Run a query directly instead of selecting one from the catalog
    #[arg(long)]
    query: Option<String>,

    /// Name of a catalog query to run
    #[arg(long)]
    query_name: Option<String>,

    /// File extensions to filter, comma-separated (e.g. .pdf,.exe)
    #[arg(long)]
    filter: Option<String>,

    /// Override the output directory
    #[arg(long)]
    output: Option<String>,

    /// Override the log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable content-type checking of candidate files
    #[arg(long)]
    check: bool,

    /// Specific file to probe for on every host
    #[arg(long)]
    target_file: Option<String>,

    /// Enable recursive directory scanning
    #[arg(long)]
    recursive: bool,

    /// Maximum depth for recursive scanning
    #[arg(long, default_value_t = 1)]
    max_depth: usize,
}

/// Splits a comma-separated filter list into extension strings.
fn parse_filters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves the query policy from CLI flags and the catalog.
fn resolve_query(cli: &Cli) -> Result<QueryConfig> {
    let mut query = if let Some(query_text) = &cli.query {
        QueryConfig {
            name: "Command Line Query".to_string(),
            query: query_text.clone(),
            filters: Vec::new(),
            check: false,
            target_filename: String::new(),
            recursive: "no".to_string(),
            max_depth: 1,
        }
    } else if let Some(query_name) = &cli.query_name {
        let queries = load_queries(&cli.queries)?;
        queries
            .into_iter()
            .find(|candidate| candidate.name == *query_name)
            .with_context(|| format!("query {query_name:?} not found in {}", cli.queries))?
    } else {
        bail!("either --query or --query-name is required");
    };

    // CLI flags override whatever the catalog says.
    if let Some(filter) = &cli.filter {
        query.filters = parse_filters(filter);
    }
    if cli.check {
        query.check = true;
    }
    if let Some(target) = &cli.target_file {
        query.target_filename = target.clone();
    }
    if cli.recursive {
        query.recursive = "yes".to_string();
    }
    if cli.max_depth > 1 {
        query.max_depth = cli.max_depth;
    }
    Ok(query)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GlobalConfig::load(&cli.config)?;
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
        config.validate()?;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    opendir_recon::logging::init(&config.log_level, &config.log_file);

    let query = resolve_query(&cli)?;
    log::info!("Query: {}", query.query);
    log::info!("Recursive: {}", query.recursive);
    if query.is_recursive() {
        log::info!("Max depth: {}", query.max_depth);
    }

    let hosts = opendir_recon::index::extract_hosts_from_results(&cli.hosts)
        .context("failed to extract hosts from results file")?;

    let sink = OutputSink::create(Path::new(&config.output_dir))
        .context("failed to create output files")?;

    let client = init_client(config.http_timeout_seconds)
        .context("failed to initialize HTTP client")?;
    let fetcher = Arc::new(HttpFetcher::new(client));

    let prober: Option<Arc<dyn Prober>> = if query.check {
        log::info!("File checking enabled, looking for binary files");
        if !query.target_filename.is_empty() {
            log::info!("Target filename: {}", query.target_filename);
        }
        let probe = ContentProbe::new(config.http_timeout_seconds, query.target_filename.clone())?;
        Some(Arc::new(probe))
    } else {
        None
    };

    let run = Run::new(&config, &query, fetcher, prober, sink);
    let report = run.process_hosts(hosts).await;

    log::info!(
        "Query execution complete: {}/{} hosts online, {} files, {} filtered, {:.1}s",
        report.stats.online_hosts,
        report.stats.total_hosts,
        report.stats.total_files,
        report.stats.filtered_files,
        report.elapsed_seconds
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters_splits_and_trims() {
        assert_eq!(parse_filters(".pdf, .exe"), vec![".pdf", ".exe"]);
        assert_eq!(parse_filters("zip"), vec!["zip"]);
        assert!(parse_filters("").is_empty());
        assert_eq!(parse_filters(",,.iso,"), vec![".iso"]);
    }

    #[test]
    fn test_direct_query_flags_override() {
        let cli = Cli::parse_from([
            "opendir-recon",
            "--hosts",
            "results.json",
            "--query",
            "autoindex",
            "--filter",
            ".exe,.msi",
            "--check",
            "--target-file",
            "setup.exe",
            "--recursive",
            "--max-depth",
            "3",
        ]);
        let query = resolve_query(&cli).expect("resolve");
        assert_eq!(query.query, "autoindex");
        assert_eq!(query.filters, vec![".exe", ".msi"]);
        assert!(query.check);
        assert_eq!(query.target_filename, "setup.exe");
        assert!(query.is_recursive());
        assert_eq!(query.max_depth, 3);
    }

    #[test]
    fn test_query_selection_is_required() {
        let cli = Cli::parse_from(["opendir-recon", "--hosts", "results.json"]);
        assert!(resolve_query(&cli).is_err());
    }
}
