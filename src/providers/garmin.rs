// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Garmin Connect client
//!
//! Login goes through the SSO web form: fetch the sign-in page, post the
//! credentials with its CSRF token, pick the service ticket out of the
//! response and exchange it for an OAuth2 bearer token. The token is kept
//! in a session file so later runs only need a profile request.

use super::{ActivityProvider, ProviderError};
use crate::auth::{
    extract_csrf_token, extract_ticket, GarminCredentials, OAuthToken, SessionStore, TokenResponse,
};
use crate::config::GarminSettings;
use crate::constants::{defaults, endpoints};
use crate::logging::AppLogger;
use crate::models::ActivitySummary;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub struct GarminConnectClient {
    client: Client,
    credentials: GarminCredentials,
    sso_base: String,
    api_base: String,
    session: SessionStore,
    token: Option<OAuthToken>,
}

impl GarminConnectClient {
    pub fn new(
        credentials: GarminCredentials,
        settings: &GarminSettings,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .user_agent(defaults::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            credentials,
            sso_base: settings.sso_base.trim_end_matches('/').to_string(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            session: SessionStore::new(&settings.session_file),
            token: None,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&OAuthToken> {
        self.token.as_ref()
    }

    /// Reuse the saved session when it still works, otherwise log in again
    pub async fn login(&mut self) -> Result<(), ProviderError> {
        if self.restore_session().await {
            AppLogger::log_auth_event("session", true, None);
            return Ok(());
        }

        match self.fresh_login().await {
            Ok(token) => {
                AppLogger::log_auth_event("sso", true, None);
                if let Err(e) = self.session.save(&token) {
                    warn!(
                        session.file = %self.session.path().display(),
                        "Could not persist Garmin session: {:#}", e
                    );
                }
                self.token = Some(token);
                Ok(())
            }
            Err(e) => {
                AppLogger::log_auth_event("sso", false, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn restore_session(&mut self) -> bool {
        let stored = match self.session.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => return false,
            Err(e) => {
                warn!("Ignoring saved session: {:#}", e);
                return false;
            }
        };

        if stored.oauth2.will_expire_soon() {
            info!("Saved Garmin session has expired or is about to, logging in again");
            return false;
        }

        match self.validate_token(&stored.oauth2).await {
            Ok(()) => {
                debug!(saved_at = %stored.saved_at, "Restored Garmin session");
                self.token = Some(stored.oauth2);
                true
            }
            Err(e) => {
                warn!("Saved Garmin session rejected, logging in again: {}", e);
                false
            }
        }
    }

    async fn validate_token(&self, token: &OAuthToken) -> Result<(), ProviderError> {
        let endpoint = format!("{}{}", self.api_base, endpoints::SOCIAL_PROFILE_PATH);
        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        check_status(response, endpoints::SOCIAL_PROFILE_PATH)?;
        Ok(())
    }

    async fn fresh_login(&self) -> Result<OAuthToken, ProviderError> {
        let signin_url = self.signin_url()?;

        let response = self.client.get(signin_url.clone()).send().await?;
        let page = check_status(response, endpoints::SSO_SIGNIN_PATH)?
            .text()
            .await?;
        let csrf = extract_csrf_token(&page)
            .ok_or_else(|| ProviderError::Auth("CSRF token not found on sign-in page".into()))?;

        let form = [
            ("username", self.credentials.email.as_str()),
            ("password", self.credentials.password.as_str()),
            ("embed", "true"),
            ("_csrf", csrf.as_str()),
        ];
        let response = self
            .client
            .post(signin_url)
            .header(reqwest::header::REFERER, self.sso_url(endpoints::SSO_SIGNIN_PATH))
            .form(&form)
            .send()
            .await?;
        let page = check_status(response, endpoints::SSO_SIGNIN_PATH)?
            .text()
            .await?;
        let ticket = extract_ticket(&page).ok_or_else(|| {
            ProviderError::Auth("Sign-in rejected: no service ticket in response".into())
        })?;

        let response = self
            .client
            .post(format!("{}{}", self.api_base, endpoints::TICKET_EXCHANGE_PATH))
            .form(&[("ticket", ticket.as_str())])
            .send()
            .await?;
        let body = check_status(response, endpoints::TICKET_EXCHANGE_PATH)?
            .text()
            .await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("token exchange: {}", e)))?;

        Ok(token.into_token(Utc::now()))
    }

    fn sso_url(&self, path: &str) -> String {
        format!("{}{}", self.sso_base, path)
    }

    fn signin_url(&self) -> Result<Url, ProviderError> {
        let embed = self.sso_url(endpoints::SSO_EMBED_PATH);
        let mut url = Url::parse(&self.sso_url(endpoints::SSO_SIGNIN_PATH))
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid SSO base URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("id", "gauth-widget")
            .append_pair("embedWidget", "true")
            .append_pair("gauthHost", &embed)
            .append_pair("service", &embed)
            .append_pair("source", &embed)
            .append_pair("redirectAfterAccountLoginUrl", &embed)
            .append_pair("redirectAfterAccountCreationUrl", &embed);
        Ok(url)
    }

    fn bearer(&self) -> Result<&str, ProviderError> {
        self.token
            .as_ref()
            .map(|token| token.access_token.as_str())
            .ok_or(ProviderError::NotLoggedIn)
    }
}

#[async_trait]
impl ActivityProvider for GarminConnectClient {
    async fn get_recent_activities(
        &self,
        start: usize,
        limit: usize,
    ) -> Result<Vec<ActivitySummary>, ProviderError> {
        let token = self.bearer()?;
        let response = self
            .client
            .get(format!("{}{}", self.api_base, endpoints::ACTIVITY_SEARCH_PATH))
            .query(&[("start", start), ("limit", limit)])
            .bearer_auth(token)
            .send()
            .await?;

        let body = check_status(response, endpoints::ACTIVITY_SEARCH_PATH)?
            .text()
            .await?;
        let activities: Vec<ActivitySummary> = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("activity list: {}", e)))?;

        debug!(activities = activities.len(), start, limit, "Fetched activity summaries");
        Ok(activities)
    }

    async fn download_fit(&self, activity_id: i64) -> Result<Option<Vec<u8>>, ProviderError> {
        let token = self.bearer()?;
        let path = format!("{}/{}", endpoints::FIT_DOWNLOAD_PATH, activity_id);
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let bytes = check_status(response, &path)?.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }

    fn provider_name(&self) -> &'static str {
        "garmin"
    }
}

fn check_status(response: Response, endpoint: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Auth(format!(
            "{} returned {}",
            endpoint,
            status.as_u16()
        ))),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
        _ => Err(ProviderError::Upstream {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        }),
    }
}
