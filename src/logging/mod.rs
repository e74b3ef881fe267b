//! Logging initialization.
//!
//! Builds the `env_logger` backend from the configured level and
//! optional log file. `RUST_LOG` still wins when set, so ad-hoc
//! debugging does not require touching the config file.

use log::LevelFilter;

/// Initializes logging. Safe to call more than once; only the first
/// call takes effect.
pub fn init(log_level: &str, log_file: &str) {
    let level = parse_level(log_level);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();

    if !log_file.is_empty() {
        match std::fs::File::create(log_file) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(error) => {
                eprintln!("Failed to open log file {log_file}: {error}; logging to stderr");
            }
        }
    }

    let _ = builder.try_init();
}

/// Maps a config level name to a filter; unknown names fall back to
/// `info`.
fn parse_level(name: &str) -> LevelFilter {
    match name.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "" | "info" => LevelFilter::Info,
        other => {
            eprintln!("Unknown log level {other:?}, falling back to info");
            LevelFilter::Info
        }
    }
}
