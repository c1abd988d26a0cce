use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::desk::DeskConfig;
use crate::jobs::JobsConfig;
use crate::profile::Profile;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub desk: DeskConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Access token cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Seconds subtracted from the server-reported expiry.
    #[serde(default = "default_safety_margin")]
    pub safety_margin_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: default_safety_margin(),
        }
    }
}

fn default_safety_margin() -> u64 {
    60
}

/// Ticket history log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("deskrelay.db")
}

/// Sanitized config for API responses (credentials redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub desk: DeskConfig,
    pub token: TokenConfig,
    pub jobs: JobsConfig,
    pub history: HistoryConfig,
    pub profiles: Vec<SanitizedProfile>,
}

/// Profile with credential material hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProfile {
    pub name: String,
    pub org_id: String,
    pub department_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    pub credentials_configured: bool,
}

impl From<&Profile> for SanitizedProfile {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            org_id: profile.org_id.clone(),
            department_id: profile.department_id.clone(),
            sender_address: profile.sender_address.clone(),
            credentials_configured: profile.credentials.is_complete(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            desk: config.desk.clone(),
            token: config.token.clone(),
            jobs: config.jobs.clone(),
            history: config.history.clone(),
            profiles: config.profiles.iter().map(SanitizedProfile::from).collect(),
        }
    }
}
