//! Authenticated HTTP client for the helpdesk REST API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::profile::Profile;

use super::error::normalize_response;
use super::token::TokenCache;
use super::{DeskConfig, DeskError};

/// Issues authenticated calls on behalf of a profile.
///
/// Every call carries the profile's access token and organization id. All
/// failures come back normalized; retry policy belongs to the caller.
pub struct DeskClient {
    client: Client,
    config: DeskConfig,
    tokens: Arc<TokenCache>,
}

impl DeskClient {
    pub fn new(config: DeskConfig, tokens: Arc<TokenCache>) -> Result<Self, DeskError> {
        let client = Client::builder()
            .build()
            .map_err(DeskError::from_transport)?;

        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    /// Perform one API call and return the parsed JSON body.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        profile: &Profile,
    ) -> Result<Value, DeskError> {
        let token = self.tokens.get_valid_token(profile).await?;
        let url = format!("{}{}", self.base_url(), path);

        debug!("{} {} (profile {})", method, url, profile.name);

        let mut request = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, format!("{} {}", self.config.auth_scheme, token))
            .header(self.config.org_header.as_str(), profile.org_id.as_str());

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(secs) = self.config.call_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = request.send().await.map_err(DeskError::from_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(DeskError::from_transport)?;

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate(&profile.name).await;
        }

        normalize_response(status, &text)
    }
}
