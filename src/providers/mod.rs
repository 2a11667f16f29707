// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::models::ActivitySummary;
use async_trait::async_trait;

pub mod garmin;

pub use garmin::GarminConnectClient;

/// Source of activity summaries and raw FIT files
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    /// Most recent activities, newest first, starting at offset `start`
    async fn get_recent_activities(
        &self,
        start: usize,
        limit: usize,
    ) -> Result<Vec<ActivitySummary>, ProviderError>;

    /// Original FIT upload for an activity; `None` when the service has none
    async fn download_fit(&self, activity_id: i64) -> Result<Option<Vec<u8>>, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

/// Failures talking to the fitness service
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited by the service")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    Upstream { status: u16, endpoint: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not logged in")]
    NotLoggedIn,
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Network(error)
        }
    }
}
