//! # Runtime Configuration
//!
//! Tuning knobs for the rendering pipeline, loaded from environment variables
//! or a TOML document.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `PAGETREE_BUFFER_POOL_SIZE` | `buffer_pool_size` | `64` |
//! | `PAGETREE_BUFFER_RETAIN_BYTES` | `buffer_retain_bytes` | `0x10000` (64 KiB) |
//! | `PAGETREE_INITIAL_BUFFER_BYTES` | `initial_buffer_bytes` | `0x1000` (4 KiB) |
//! | `PAGETREE_CONTENT_TYPE` | `content_type` | `text/html; charset=utf-8` |
//! | `PAGETREE_LOG_ROUTES` | `log_routes` | `true` |
//!
//! Sizes accept decimal (`65536`) or hexadecimal (`0x10000`). Unparseable
//! values fall back to the default.
//!
//! ## TOML
//!
//! ```rust
//! use pagetree::Config;
//!
//! let config = Config::from_toml_str(r#"
//!     buffer_pool_size = 8
//!     content_type = "text/html"
//! "#)?;
//! assert_eq!(config.buffer_pool_size, 8);
//! assert_eq!(config.initial_buffer_bytes, 0x1000);
//! # Ok::<(), pagetree::Error>(())
//! ```

use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_POOL_SIZE: usize = 64;
const DEFAULT_RETAIN_BYTES: usize = 0x10000;
const DEFAULT_INITIAL_BYTES: usize = 0x1000;
const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Idle render buffers kept for reuse.
    pub buffer_pool_size: usize,
    /// Buffers that grew beyond this capacity are freed instead of pooled.
    pub buffer_retain_bytes: usize,
    /// Capacity of freshly allocated buffers.
    pub initial_buffer_bytes: usize,
    /// Content type set on rendered pages when the handler did not set one.
    pub content_type: String,
    /// Log every route registration at `info` level (otherwise `debug`).
    pub log_routes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_pool_size: DEFAULT_POOL_SIZE,
            buffer_retain_bytes: DEFAULT_RETAIN_BYTES,
            initial_buffer_bytes: DEFAULT_INITIAL_BYTES,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            log_routes: true,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn env_size(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            buffer_pool_size: env_size("PAGETREE_BUFFER_POOL_SIZE", DEFAULT_POOL_SIZE),
            buffer_retain_bytes: env_size("PAGETREE_BUFFER_RETAIN_BYTES", DEFAULT_RETAIN_BYTES),
            initial_buffer_bytes: env_size("PAGETREE_INITIAL_BUFFER_BYTES", DEFAULT_INITIAL_BYTES),
            content_type: env::var("PAGETREE_CONTENT_TYPE")
                .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string()),
            log_routes: env::var("PAGETREE_LOG_ROUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_size_decimal_and_hex() {
        assert_eq!(parse_size("16384"), Some(16384));
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size(" 0X10 "), Some(16));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_from_env_reads_overrides() {
        env::set_var("PAGETREE_BUFFER_POOL_SIZE", "0x20");
        env::set_var("PAGETREE_BUFFER_RETAIN_BYTES", "not-a-number");
        env::set_var("PAGETREE_LOG_ROUTES", "false");
        let config = Config::from_env();
        env::remove_var("PAGETREE_BUFFER_POOL_SIZE");
        env::remove_var("PAGETREE_BUFFER_RETAIN_BYTES");
        env::remove_var("PAGETREE_LOG_ROUTES");

        assert_eq!(config.buffer_pool_size, 32);
        assert_eq!(config.buffer_retain_bytes, DEFAULT_RETAIN_BYTES);
        assert!(!config.log_routes);
    }

    #[test]
    fn test_toml_partial_document_keeps_defaults() {
        let config = Config::from_toml_str("log_routes = false").unwrap();
        assert!(!config.log_routes);
        assert_eq!(config.buffer_pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_toml_unknown_field_is_config_error() {
        let err = Config::from_toml_str("buffer_pool = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_pool_size = 3").unwrap();
        writeln!(file, "initial_buffer_bytes = 128").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.buffer_pool_size, 3);
        assert_eq!(config.initial_buffer_bytes, 128);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
