//! Structured logging setup.
//!
//! Every module logs through `tracing` macros with structured fields. This
//! module installs a `tracing-subscriber` registry for applications that do
//! not bring their own.
//!
//! ```no_run
//! use pagetree::logging::{init_logging, LogConfig};
//!
//! let _guard = init_logging(&LogConfig::from_env()).expect("logging");
//! ```

use std::env;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error; `RUST_LOG` takes precedence when set
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a background thread
    pub async_logging: bool,
    /// Extra comma-separated filter directives, e.g. `pagetree::router=debug`
    pub target_filter: Option<String>,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("PAGETREE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("PAGETREE_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            async_logging: env::var("PAGETREE_LOG_ASYNC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            target_filter: env::var("PAGETREE_LOG_TARGET_FILTER").ok(),
            include_location: env::var("PAGETREE_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));

    if let Some(target_filter) = &config.target_filter {
        for directive in target_filter.split(',').map(str::trim) {
            if directive.is_empty() {
                continue;
            }
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {}", directive),
            }
        }
    }
    filter
}

/// Install the global subscriber.
///
/// Returns the background writer guard when `async_logging` is on; keep it
/// alive for the life of the process or buffered events are lost.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_level_parse_defaults_to_info() {
        let mut config = LogConfig::default_dev();
        assert_eq!(config.level(), Level::DEBUG);
        config.log_level = "WARN".to_string();
        assert_eq!(config.level(), Level::WARN);
        config.log_level = "chatty".to_string();
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_build_filter_skips_invalid_directives() {
        let mut config = LogConfig::default_dev();
        config.target_filter = Some("pagetree::router=trace, ,=[bad".to_string());
        let filter = build_filter(&config).to_string();
        assert!(filter.contains("pagetree::router=trace"));
    }
}
