// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Authentication and Session Management
//!
//! Credentials, the OAuth2 token handed out by Garmin's ticket exchange,
//! and the on-disk session file that lets a later run skip the SSO login.
//! The HTTP side of the login lives in [`crate::providers::garmin`].

use crate::constants::env_config;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Garmin account credentials, read from the environment only
#[derive(Clone)]
pub struct GarminCredentials {
    pub email: String,
    pub password: String,
}

impl GarminCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Read `GARMIN_EMAIL` and `GARMIN_PASSWORD`
    pub fn from_env() -> Result<Self> {
        let email = env_config::non_empty(env_config::GARMIN_EMAIL).with_context(|| {
            format!("Missing required environment variable: {}", env_config::GARMIN_EMAIL)
        })?;
        let password = env_config::non_empty(env_config::GARMIN_PASSWORD).with_context(|| {
            format!("Missing required environment variable: {}", env_config::GARMIN_PASSWORD)
        })?;
        Ok(Self { email, password })
    }
}

impl fmt::Debug for GarminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token used against the Connect API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// True when the token expires within the next five minutes
    pub fn will_expire_soon(&self) -> bool {
        self.is_expired_at(Utc::now() + Duration::minutes(5))
    }
}

/// Raw body of the ticket exchange endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Turn the relative `expires_in` into an absolute expiry
    pub fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_at: self.expires_in.map(|seconds| now + Duration::seconds(seconds)),
            refresh_token: self.refresh_token,
            scope: self.scope,
        }
    }
}

/// Contents of the session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub oauth2: OAuthToken,
    pub saved_at: DateTime<Utc>,
}

/// JSON session file on disk
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session; `Ok(None)` when no file exists yet
    pub fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("Malformed session file {}", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory {}", parent.display())
            })?;
        }

        let session = StoredSession {
            oauth2: token.clone(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&session)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        Ok(())
    }
}

/// CSRF token embedded in the SSO sign-in form
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let pattern = Regex::new(r#"name="_csrf"\s+value="(.+?)""#).ok()?;
    pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Service ticket from the post-login redirect page
pub fn extract_ticket(html: &str) -> Option<String> {
    let pattern = Regex::new(r#"embed\?ticket=([^"]+)""#).ok()?;
    pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
