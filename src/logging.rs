//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_logging`] is what the scaffolder binary and the
//! generated projects use. Output goes to stderr so stdout stays free for
//! command output such as the checksum manifest.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const ENV_LOG_LEVEL: &str = "OPENAPI_GLUE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "OPENAPI_GLUE_LOG_FORMAT";
pub const ENV_LOG_TARGET_FILTER: &str = "OPENAPI_GLUE_LOG_TARGET_FILTER";

/// Log format: JSON for machines, pretty-print for terminals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra comma separated `EnvFilter` directives
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_level: lookup(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(&lookup(ENV_LOG_FORMAT).unwrap_or_else(|| "pretty".to_string())),
            target_filter: lookup(ENV_LOG_TARGET_FILTER),
            include_location: false,
        }
    }

    /// Verbose configuration for local debugging
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
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

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set. Fails if a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
            }
        }
    }

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_from_lookup_values() {
        let config = LogConfig::from_lookup(|name| match name {
            ENV_LOG_LEVEL => Some("debug".to_string()),
            ENV_LOG_FORMAT => Some("json".to_string()),
            _ => None,
        });
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
    }
}
