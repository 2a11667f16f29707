// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Service endpoints, default values and environment variable names.
//! Runtime overrides are resolved in [`crate::config`].

/// Garmin Connect endpoints and paths
pub mod endpoints {
    /// Single sign-on host
    pub const GARMIN_SSO_BASE: &str = "https://sso.garmin.com";
    /// Connect API host (bearer-token authenticated)
    pub const GARMIN_API_BASE: &str = "https://connectapi.garmin.com";

    pub const SSO_SIGNIN_PATH: &str = "/sso/signin";
    pub const SSO_EMBED_PATH: &str = "/sso/embed";
    pub const TICKET_EXCHANGE_PATH: &str = "/oauth-service/oauth/exchange/user/2.0";
    pub const SOCIAL_PROFILE_PATH: &str = "/userprofile-service/socialProfile";
    pub const ACTIVITY_SEARCH_PATH: &str = "/activitylist-service/activities/search/activities";
    pub const FIT_DOWNLOAD_PATH: &str = "/download-service/files/activity";
}

/// Default values used when neither the config file nor the environment set one
pub mod defaults {
    pub const DAYS: u32 = 14;
    pub const LIMIT: usize = 50;
    pub const ACTIVITY_TYPE: &str = "running";
    pub const CSV_PATH: &str = "data/activities.csv";
    pub const FIT_DIR: &str = "data/fit";
    pub const TIMESERIES_CSV: &str = "data/fit/activity_timeseries.csv";
    pub const SESSION_FILE: &str = ".session/garmin_session.json";
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    pub const DASHBOARD_PORT: u16 = 8501;
    pub const USER_AGENT: &str = concat!("runstack/", env!("CARGO_PKG_VERSION"));
    pub const SERVICE_NAME: &str = "runstack";
}

/// Environment variable names
pub mod env_config {
    use std::env;

    pub const GARMIN_EMAIL: &str = "GARMIN_EMAIL";
    pub const GARMIN_PASSWORD: &str = "GARMIN_PASSWORD";
    pub const GARMIN_SSO_BASE: &str = "GARMIN_SSO_BASE";
    pub const GARMIN_API_BASE: &str = "GARMIN_API_BASE";
    pub const SESSION_FILE: &str = "RUNSTACK_SESSION_FILE";
    pub const HTTP_TIMEOUT_SECS: &str = "RUNSTACK_HTTP_TIMEOUT_SECS";
    pub const DASHBOARD_PORT: &str = "RUNSTACK_DASHBOARD_PORT";

    /// Read a variable, treating an empty value as unset
    pub fn non_empty(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

/// Analytics thresholds and unit conversions
pub mod analysis {
    /// Minimum qualifying samples for any first-half/second-half comparison
    pub const MIN_HALVED_SAMPLES: usize = 2;
    /// Minimum cadence values for a dispersion measure
    pub const MIN_CADENCE_SAMPLES: usize = 2;
    pub const METERS_PER_KILOMETER: f64 = 1000.0;
    pub const METERS_PER_MILE: f64 = 1609.344;
    /// Decimal places used when metrics are rendered or exported
    pub const DISPLAY_PRECISION: u32 = 2;
}
