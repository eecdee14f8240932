//! Structured logging setup.
//!
//! The log format is read from `PAUSE_LOG_FORMAT` (`json`, `pretty` or
//! `compact`). When unset, a terminal gets `pretty` output and anything else
//! gets `json`. The filter comes from `PAUSE_LOG_LEVEL`, then `RUST_LOG`, and
//! defaults to `info`.

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as layer_fmt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Read the configuration from the environment.
    ///
    /// An unrecognised `PAUSE_LOG_FORMAT` falls back to auto-detection.
    pub fn from_env() -> Self {
        let log_format = env::var("PAUSE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                if std::io::stdout().is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Json
                }
            });

        let log_filter = env::var("PAUSE_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
            include_location: env::var("PAUSE_LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Override the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Override the filter directives.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Include source file and line in events.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// The log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Whether source location is included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed. An invalid filter falls back
/// to `info`.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    let location = config.include_location();
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format() {
        LogFormat::Json => registry
            .with(
                layer_fmt::layer()
                    .json()
                    .with_file(location)
                    .with_line_number(location)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                layer_fmt::layer()
                    .pretty()
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                layer_fmt::layer()
                    .compact()
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("COMPACT".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn overrides() {
        let config = TracingConfig::default()
            .with_log_format(LogFormat::Json)
            .with_log_filter("debug,kube=warn")
            .with_location(true);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.log_filter(), "debug,kube=warn");
        assert!(config.include_location());
    }
}
