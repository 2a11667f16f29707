// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # runstack
//!
//! Export Garmin Connect activities to CSV and analyze individual runs from
//! their FIT recordings.
//!
//! ## Features
//!
//! - **Activity export**: recent activities of one type, flattened to CSV,
//!   optionally enriched with heart-rate and cadence figures from each FIT file
//! - **Run analysis**: average/max heart rate, HR drift, pace-to-HR ratio,
//!   cadence consistency and aerobic decoupling for a single activity
//! - **Session reuse**: the OAuth2 token is cached on disk between runs
//! - **Dashboard**: a small local web page over the same two pipelines
//!
//! ## Architecture
//!
//! - **Providers**: the [`ActivityProvider`](providers::ActivityProvider)
//!   trait and the Garmin Connect client behind it
//! - **FIT**: decoding of raw downloads into a [`TimeSeries`](models::TimeSeries)
//! - **Intelligence**: pure metric computations over a time-series
//! - **Pipeline**: the export and analyze flows
//! - **Storage**: CSV and FIT file output
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use runstack::auth::GarminCredentials;
//! use runstack::config::AppConfig;
//! use runstack::pipeline::{export, ExportRequest};
//! use runstack::providers::GarminConnectClient;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let mut client = GarminConnectClient::new(GarminCredentials::from_env()?, &config.garmin)?;
//!     client.login().await?;
//!
//!     let outcome = export(&client, &ExportRequest::from(&config.export)).await?;
//!     println!("{} activities written", outcome.row_count);
//!     Ok(())
//! }
//! ```

/// Authentication credentials and session persistence
pub mod auth;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Local web dashboard
pub mod dashboard;

/// FIT decoding
pub mod fit;

/// Run-performance analytics
pub mod intelligence;

/// Structured logging
pub mod logging;

/// Common data models
pub mod models;

/// Export and analyze pipelines
pub mod pipeline;

/// Activity provider trait and the Garmin Connect client
pub mod providers;

/// CSV and FIT file output
pub mod storage;
