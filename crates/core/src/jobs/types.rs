//! Types for the bulk job engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::desk::ErrorInfo;

/// Errors that stop a job before any item is processed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    /// A live job already exists for this session and profile.
    #[error("a job is already running for profile {0}")]
    AlreadyRunning(String),

    /// Profile not configured.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Direct replies were requested but the profile has no sender address.
    #[error("profile {0} has no sender address; direct replies need one")]
    MissingSenderAddress(String),

    /// Every recipient entry was blank.
    #[error("no recipients to process")]
    NoRecipients,

    /// The inter-item delay does not fit a duration.
    #[error("delay of {0} seconds is out of range")]
    InvalidDelay(f64),
}

/// Identifies a job: one profile within one client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub session_id: String,
    pub profile_name: String,
}

impl JobKey {
    pub fn new(session_id: impl Into<String>, profile_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            profile_name: profile_name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.profile_name)
    }
}

/// Control status of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Paused,
    Ended,
}

/// Request to start a bulk job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBulkJob {
    pub profile: String,
    /// Recipient addresses, one ticket each.
    #[serde(alias = "items")]
    pub emails: Vec<String>,
    pub subject: String,
    pub description: String,
    /// Pause between items, in seconds.
    #[serde(default)]
    pub delay: f64,
    /// Send a direct email reply after creating each ticket.
    #[serde(default, alias = "replyFlag")]
    pub send_reply: bool,
    /// Verify delivery of each created ticket after a settle delay.
    #[serde(default, alias = "verifyFlag")]
    pub verify: bool,
}

impl StartBulkJob {
    /// Inter-item delay. Zero, negative and NaN values mean none.
    pub fn delay(&self) -> Result<Duration, JobError> {
        if self.delay.is_nan() || self.delay <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(self.delay).map_err(|_| JobError::InvalidDelay(self.delay))
    }

    /// Trimmed recipients with blank entries dropped, in submission order.
    pub fn recipients(&self) -> Vec<String> {
        self.emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub email: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    /// A failed item carrying a normalized error.
    pub fn failure(email: impl Into<String>, info: ErrorInfo) -> Self {
        Self {
            email: email.into(),
            success: false,
            ticket_number: None,
            details: info.message.clone(),
            full_response: Some(info.full_response),
            error: Some(info.message),
        }
    }
}

/// How a job's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every item was processed.
    Completed,
    /// Stopped by an end command or session disconnect.
    Ended,
    /// Setup failed; no items were processed.
    Error(String),
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Ended => "ended",
            JobOutcome::Error(_) => "error",
        }
    }
}
