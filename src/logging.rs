// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Logging configuration with structured output
//!
//! Everything is written to stderr; stdout is reserved for command output
//! such as `analyze --json`.

use crate::constants::defaults;
use anyhow::{anyhow, Result};
use std::env;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Include span enter/exit events
    pub include_spans: bool,
    pub service_name: String,
    pub service_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line human readable output
    Pretty,
    /// Single-line human readable output
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_spans: false,
            service_name: defaults::SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    ///
    /// `.env` is loaded first, so logging settings kept there apply even
    /// though the subscriber is installed before the config file is read.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Compact,
        };

        Self {
            level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            format,
            include_location: lookup("LOG_INCLUDE_LOCATION").is_some(),
            include_spans: lookup("LOG_INCLUDE_SPANS").is_some(),
            ..Self::default()
        }
    }

    /// Raise the level to `debug` (the CLI `--verbose` flag)
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Install the global tracing subscriber
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let installed = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_file(self.include_location)
                        .with_line_number(self.include_location)
                        .with_target(true)
                        .with_writer(io::stderr)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_file(self.include_location)
                        .with_line_number(self.include_location)
                        .with_target(true)
                        .with_writer(io::stderr)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(io::stderr)
                        .with_span_events(FmtSpan::NONE),
                )
                .try_init(),
        };
        installed.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

        debug!(
            service.name = %self.service_name,
            service.version = %self.service_version,
            log.level = %self.level,
            log.format = ?self.format,
            "Logging initialized"
        );
        Ok(())
    }
}

/// Application-specific logging utilities
pub struct AppLogger;

impl AppLogger {
    /// Log Garmin authentication outcomes
    pub fn log_auth_event(method: &str, success: bool, details: Option<&str>) {
        if success {
            info!(auth.method = %method, auth.success = true, "Garmin authentication");
        } else {
            warn!(
                auth.method = %method,
                auth.success = false,
                auth.details = details.unwrap_or(""),
                "Garmin authentication"
            );
        }
    }

    /// Log a finished export
    pub fn log_export_event(rows: usize, path: &Path, include_fit: bool, duration_ms: u64) {
        info!(
            export.rows = rows,
            export.path = %path.display(),
            export.include_fit = include_fit,
            export.duration_ms = duration_ms,
            "Activity export written"
        );
    }

    /// Log a downloaded and decoded FIT file
    pub fn log_fit_event(activity_id: i64, bytes: usize, samples: usize) {
        info!(
            activity.id = activity_id,
            fit.bytes = bytes,
            fit.samples = samples,
            "FIT file decoded"
        );
    }

    /// Log a per-activity failure that was tolerated
    pub fn log_activity_warning(activity_id: i64, stage: &str, error: &dyn std::fmt::Display) {
        warn!(
            activity.id = activity_id,
            stage = %stage,
            error = %error,
            "Skipping FIT data for activity"
        );
    }

    /// Log a computed metrics record
    pub fn log_analysis_event(activity_id: i64, samples: usize, available_metrics: usize) {
        info!(
            activity.id = activity_id,
            analysis.samples = samples,
            analysis.available = available_metrics,
            "Performance metrics computed"
        );
    }

    /// Log dashboard API requests
    pub fn log_api_request(method: &str, path: &str, status: u16, duration_ms: u64) {
        info!(
            http.method = %method,
            http.path = %path,
            http.status = status,
            http.duration_ms = duration_ms,
            "HTTP request"
        );
    }
}
