//! Remote helpdesk integration.
//!
//! - [`TokenCache`]: per-profile access tokens with lazy refresh
//! - [`DeskClient`]: authenticated calls with failure normalization
//! - [`HelpdeskApi`]: the typed operations the job engine depends on

mod api;
mod client;
mod error;
mod token;
mod types;

pub use api::HttpHelpdesk;
pub use client::DeskClient;
pub use error::{extract_html_title, normalize_response, DeskError, ErrorInfo};
pub use token::{IssuedToken, OAuthTokenProvider, TokenCache, TokenCacheEntry, TokenProvider};
pub use types::{data_entries, CreatedTicket, FailureAlert, NewTicket, ReplyRequest};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::Profile;

/// Helpdesk endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// OAuth accounts server base URL.
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    /// Scheme placed before the token in the Authorization header.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    /// Header carrying the profile's organization id.
    #[serde(default = "default_org_header")]
    pub org_header: String,
    /// Per-call deadline in seconds. Unset means calls may take as long as the server does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

fn default_api_base() -> String {
    "https://desk.zoho.com/api/v1".to_string()
}

fn default_accounts_url() -> String {
    "https://accounts.zoho.com".to_string()
}

fn default_auth_scheme() -> String {
    "Zoho-oauthtoken".to_string()
}

fn default_org_header() -> String {
    "orgId".to_string()
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            accounts_url: default_accounts_url(),
            auth_scheme: default_auth_scheme(),
            org_header: default_org_header(),
            call_timeout_secs: None,
        }
    }
}

/// Operations the job engine performs against the helpdesk.
#[async_trait]
pub trait HelpdeskApi: Send + Sync {
    /// Create a ticket in the profile's department.
    async fn create_ticket(
        &self,
        profile: &Profile,
        ticket: &NewTicket,
    ) -> Result<CreatedTicket, DeskError>;

    /// Send a direct email reply on a ticket.
    async fn send_reply(
        &self,
        profile: &Profile,
        ticket_id: &str,
        reply: &ReplyRequest,
    ) -> Result<Value, DeskError>;

    /// Workflow/automation history entries of a ticket.
    async fn workflow_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError>;

    /// Notification history entries of a ticket.
    async fn notification_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError>;

    /// Email delivery failure alerts for the profile's department.
    async fn failure_alerts(&self, profile: &Profile) -> Result<Vec<FailureAlert>, DeskError>;

    /// Clear the failure alerts of the profile's department.
    async fn clear_failure_alerts(&self, profile: &Profile) -> Result<(), DeskError>;
}
