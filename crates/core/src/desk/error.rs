//! Failure taxonomy for helpdesk calls and its reduction to [`ErrorInfo`].

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Longest raw body excerpt kept in diagnostics.
const MAX_BODY_EXCERPT: usize = 2000;

static HTML_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex is valid")
});

/// Errors that can occur when talking to the helpdesk.
#[derive(Debug, Clone, Error)]
pub enum DeskError {
    /// No response was received (connect failure, timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response with a JSON or plain-text body.
    #[error("HTTP Error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Value,
    },

    /// Body that is not JSON, typically an HTML error page.
    #[error("Malformed response (HTTP {status}): {title}")]
    MalformedResponse {
        status: u16,
        title: String,
        body: String,
    },

    /// A required field was missing before any call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The token endpoint answered without issuing a token.
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl DeskError {
    /// Map a transport-level reqwest failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeskError::Network(format!("request timed out: {}", err))
        } else {
            DeskError::Network(err.to_string())
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeskError::Http { status, .. } | DeskError::MalformedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A failure reduced to what crosses the event boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    pub full_response: Value,
}

impl From<&DeskError> for ErrorInfo {
    fn from(err: &DeskError) -> Self {
        let full_response = match err {
            DeskError::Network(msg) | DeskError::Validation(msg) | DeskError::Auth(msg) => {
                json!({ "error": msg })
            }
            DeskError::Http {
                status,
                message,
                body,
            } => {
                if body.is_null() {
                    json!({ "status": status, "message": message })
                } else {
                    body.clone()
                }
            }
            DeskError::MalformedResponse {
                status,
                title,
                body,
            } => json!({ "status": status, "title": title, "body": body }),
        };

        Self {
            message: err.to_string(),
            full_response,
        }
    }
}

impl From<DeskError> for ErrorInfo {
    fn from(err: DeskError) -> Self {
        ErrorInfo::from(&err)
    }
}

/// Turn a raw HTTP status and body into a JSON value or a [`DeskError`].
///
/// Empty bodies on success become `Value::Null`.
pub fn normalize_response(status: StatusCode, body: &str) -> Result<Value, DeskError> {
    let trimmed = body.trim();

    if trimmed.is_empty() {
        return if status.is_success() {
            Ok(Value::Null)
        } else {
            Err(DeskError::Http {
                status: status.as_u16(),
                message: reason(status),
                body: Value::Null,
            })
        };
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if status.is_success() => Ok(value),
        Ok(value) => Err(DeskError::Http {
            status: status.as_u16(),
            message: extract_message(&value).unwrap_or_else(|| reason(status)),
            body: value,
        }),
        Err(_) if looks_like_html(trimmed) => Err(DeskError::MalformedResponse {
            status: status.as_u16(),
            title: extract_html_title(trimmed).unwrap_or_else(|| "untitled HTML page".to_string()),
            body: excerpt(trimmed, MAX_BODY_EXCERPT),
        }),
        Err(_) if status.is_success() => Err(DeskError::MalformedResponse {
            status: status.as_u16(),
            title: excerpt(trimmed, 120),
            body: excerpt(trimmed, MAX_BODY_EXCERPT),
        }),
        Err(_) => Err(DeskError::Http {
            status: status.as_u16(),
            message: excerpt(trimmed, 200),
            body: Value::String(excerpt(trimmed, MAX_BODY_EXCERPT)),
        }),
    }
}

/// Pull a human-readable message out of a JSON error body.
fn extract_message(value: &Value) -> Option<String> {
    ["message", "error_description", "errorCode", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html") || head.contains("<title")
}

/// Extract the `<title>` of an HTML page, whitespace-collapsed.
pub fn extract_html_title(html: &str) -> Option<String> {
    HTML_TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|title| !title.is_empty())
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown status")
        .to_string()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
