//! Structured logging setup for kwci
//!
//! Logs go to stderr so that stdout stays free for the values CI scripts
//! capture (`export` lines, the last-sync timestamp, project lists).
//!
//! # Example
//!
//! ```no_run
//! use kwci::util::logging;
//!
//! // With environment: KWCI_LOG_LEVEL=debug
//! logging::init_from_env();
//!
//! tracing::info!("Klocwork environment ready");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

pub const LOG_LEVEL_ENV: &str = "KWCI_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "KWCI_LOG_JSON";

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display
    pub level: Level,

    /// Use JSON output format (for log collectors on the CI host)
    pub use_json: bool,

    /// Include the module target (e.g., kwci::sync) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Level and JSON switch taken from `KWCI_LOG_LEVEL` and `KWCI_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .map(|l| parse_level(&l))
            .unwrap_or(Level::INFO);

        let use_json = env::var(LOG_JSON_ENV)
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }
}

/// Parses a log level from a string
///
/// Unknown names fall back to `INFO`.
///
/// ```
/// use kwci::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Default filter: our crate at the configured level, HTTP internals at `warn`.
///
/// `RUST_LOG` replaces the defaults entirely when set.
fn build_filter(level: Level) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    if env::var("RUST_LOG").is_ok() {
        return filter;
    }

    [
        format!("kwci={}", level),
        "h2=warn".to_string(),
        "hyper=warn".to_string(),
        "reqwest=warn".to_string(),
    ]
    .iter()
    .filter_map(|d| d.parse::<Directive>().ok())
    .fold(filter, EnvFilter::add_directive)
}

/// Initializes the logging system; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });
}

/// Initializes logging from `KWCI_LOG_LEVEL` and `KWCI_LOG_JSON`
pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var(LOG_LEVEL_ENV, "debug");
        env::set_var(LOG_JSON_ENV, "true");
        let config = LoggingConfig::from_env();
        env::remove_var(LOG_LEVEL_ENV);
        env::remove_var(LOG_JSON_ENV);

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::remove_var(LOG_LEVEL_ENV);
        env::remove_var(LOG_JSON_ENV);

        let config = LoggingConfig::from_env();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
    }
}
