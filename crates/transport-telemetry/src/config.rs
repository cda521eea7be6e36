//! Telemetry configuration from environment variables.

use std::env;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or full directive
    pub log_level: String,

    /// Output format
    pub format: LogFormat,

    /// Whether to install the fmt layer at all
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "topic-transport".to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            console_output: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TP_SERVICE_NAME`: Service name (default: topic-transport)
    /// - `TP_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `TP_LOG_FORMAT`: `pretty` or `json` (default: pretty)
    /// - `TP_CONSOLE_OUTPUT`: Enable console output (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: env::var("TP_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("TP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            format: env::var("TP_LOG_FORMAT")
                .ok()
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.format),

            console_output: env::var("TP_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),
        }
    }

    /// Quiet configuration for tests: warnings only.
    pub fn for_testing() -> Self {
        Self {
            log_level: "warn".to_string(),
            ..Self::default()
        }
    }
}
