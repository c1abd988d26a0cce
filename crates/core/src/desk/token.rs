//! Per-profile access token cache.
//!
//! Tokens are refreshed lazily. Each profile has its own async mutex held for
//! the duration of a refresh, so concurrent callers for one profile wait for a
//! single exchange instead of issuing their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics::TOKEN_REFRESHES;
use crate::profile::Profile;

use super::error::normalize_response;
use super::DeskError;

/// Upper bound on how long a cached token is trusted.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A token as issued by the identity provider.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime reported by the server.
    pub expires_in_secs: u64,
}

/// Source of fresh access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange the profile's stored credentials for a new access token.
    async fn refresh(&self, profile: &Profile) -> Result<IssuedToken, DeskError>;
}

/// A cached token. Only used while `now < expires_at`.
#[derive(Debug, Clone)]
pub struct TokenCacheEntry {
    pub access_token: String,
    pub expires_at: Instant,
}

impl TokenCacheEntry {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type Slot = Arc<Mutex<Option<TokenCacheEntry>>>;

/// Token cache shared by every job.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    safety_margin: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, safety_margin: Duration) -> Self {
        Self {
            provider,
            safety_margin,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, profile_name: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(profile_name.to_string()).or_default())
    }

    /// Return a valid access token for the profile, refreshing if needed.
    ///
    /// A failed refresh leaves the cache untouched.
    pub async fn get_valid_token(&self, profile: &Profile) -> Result<String, DeskError> {
        let slot = self.slot(&profile.name).await;
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("Refreshing access token for profile {}", profile.name);
        let issued = match self.provider.refresh(profile).await {
            Ok(issued) => {
                TOKEN_REFRESHES.with_label_values(&["success"]).inc();
                issued
            }
            Err(e) => {
                TOKEN_REFRESHES.with_label_values(&["failure"]).inc();
                warn!("Token refresh failed for profile {}: {}", profile.name, e);
                return Err(e);
            }
        };

        let lifetime = Duration::from_secs(issued.expires_in_secs)
            .saturating_sub(self.safety_margin)
            .min(MAX_TOKEN_LIFETIME);
        let token = issued.access_token;
        *entry = Some(TokenCacheEntry {
            access_token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token)
    }

    /// Drop the cached token for a profile so the next call refreshes.
    pub async fn invalidate(&self, profile_name: &str) {
        let slot = self.slots.lock().await.get(profile_name).cloned();
        if let Some(slot) = slot {
            *slot.lock().await = None;
            debug!("Invalidated cached token for profile {}", profile_name);
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// OAuth2 refresh-token grant against the accounts server.
pub struct OAuthTokenProvider {
    client: Client,
    accounts_url: String,
}

impl OAuthTokenProvider {
    pub fn new(accounts_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, DeskError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(DeskError::from_transport)?;

        Ok(Self {
            client,
            accounts_url: accounts_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn refresh(&self, profile: &Profile) -> Result<IssuedToken, DeskError> {
        let url = format!("{}/oauth/v2/token", self.accounts_url);
        let params = [
            ("refresh_token", profile.credentials.refresh_token.as_str()),
            ("client_id", profile.credentials.client_id.as_str()),
            ("client_secret", profile.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(DeskError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(DeskError::from_transport)?;
        let value = normalize_response(status, &body)?;

        let parsed: TokenResponse = serde_json::from_value(value)
            .map_err(|e| DeskError::Auth(format!("unexpected token response: {}", e)))?;

        match parsed.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(IssuedToken {
                access_token,
                expires_in_secs: parsed.expires_in.unwrap_or(3600),
            }),
            _ => Err(DeskError::Auth(
                parsed
                    .error
                    .unwrap_or_else(|| "token endpoint returned no access_token".to_string()),
            )),
        }
    }
}
