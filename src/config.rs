// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration management
//!
//! Resolution order: built-in defaults, then the TOML file (`--config` or
//! `<config_dir>/runstack/config.toml`), then environment variables.
//! Credentials are never read from the file.

use crate::constants::{defaults, endpoints, env_config};
use crate::intelligence::PaceUnit;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub garmin: GarminSettings,
    pub export: ExportDefaults,
    pub analysis: AnalysisSettings,
    pub dashboard: DashboardSettings,
}

/// Service endpoints and session handling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GarminSettings {
    pub sso_base: String,
    pub api_base: String,
    pub session_file: PathBuf,
    pub http_timeout_secs: u64,
}

impl Default for GarminSettings {
    fn default() -> Self {
        Self {
            sso_base: endpoints::GARMIN_SSO_BASE.to_string(),
            api_base: endpoints::GARMIN_API_BASE.to_string(),
            session_file: PathBuf::from(defaults::SESSION_FILE),
            http_timeout_secs: defaults::HTTP_TIMEOUT_SECS,
        }
    }
}

/// Defaults for CLI flags and dashboard forms
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportDefaults {
    pub days: u32,
    pub limit: usize,
    pub activity_type: String,
    pub csv_path: PathBuf,
    pub fit_dir: PathBuf,
    pub timeseries_csv: PathBuf,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            days: defaults::DAYS,
            limit: defaults::LIMIT,
            activity_type: defaults::ACTIVITY_TYPE.to_string(),
            csv_path: PathBuf::from(defaults::CSV_PATH),
            fit_dir: PathBuf::from(defaults::FIT_DIR),
            timeseries_csv: PathBuf::from(defaults::TIMESERIES_CSV),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub pace_unit: PaceUnit,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub port: u16,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            port: defaults::DASHBOARD_PORT,
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join(defaults::SERVICE_NAME).join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load `.env`, the config file (if any) and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::from_file(path)?;
        config.apply_overrides(env_config::non_empty)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the TOML file; a missing file yields the defaults
    pub fn from_file(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !config_path.exists() {
            if path.is_some() {
                bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Apply overrides from a variable lookup (the process environment in [`AppConfig::load`])
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env_config::GARMIN_SSO_BASE) {
            self.garmin.sso_base = value;
        }
        if let Some(value) = lookup(env_config::GARMIN_API_BASE) {
            self.garmin.api_base = value;
        }
        if let Some(value) = lookup(env_config::SESSION_FILE) {
            self.garmin.session_file = PathBuf::from(value);
        }
        if let Some(value) = lookup(env_config::HTTP_TIMEOUT_SECS) {
            self.garmin.http_timeout_secs = value.trim().parse().with_context(|| {
                format!("{} must be a whole number of seconds", env_config::HTTP_TIMEOUT_SECS)
            })?;
        }
        if let Some(value) = lookup(env_config::DASHBOARD_PORT) {
            self.dashboard.port = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number", env_config::DASHBOARD_PORT))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.garmin.sso_base.trim().is_empty() {
            bail!("garmin.sso_base must not be empty");
        }
        if self.garmin.api_base.trim().is_empty() {
            bail!("garmin.api_base must not be empty");
        }
        if self.garmin.http_timeout_secs == 0 {
            bail!("garmin.http_timeout_secs must be greater than zero");
        }
        if self.export.limit == 0 {
            bail!("export.limit must be greater than zero");
        }
        Ok(())
    }
}
