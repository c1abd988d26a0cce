//! Request and response types for helpdesk operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DeskError;

/// A ticket to be created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub department_id: String,
    pub email: String,
    pub subject: String,
    pub description: String,
}

/// A direct email reply on an existing ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub channel: String,
    pub from_email_address: String,
    pub to: String,
    pub content: String,
    pub content_type: String,
}

impl ReplyRequest {
    /// An HTML email reply.
    pub fn email(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: "EMAIL".to_string(),
            from_email_address: from.into(),
            to: to.into(),
            content: content.into(),
            content_type: "html".to_string(),
        }
    }
}

/// The remote resource created for one work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTicket {
    /// Remote resource id, used for follow-up calls.
    pub id: String,
    /// Human-facing ticket number.
    pub ticket_number: String,
    /// Response body as returned by the helpdesk.
    pub raw: Value,
}

impl CreatedTicket {
    /// Parse a ticket creation response.
    pub fn from_response(raw: Value) -> Result<Self, DeskError> {
        let id = string_field(&raw, "id");
        let ticket_number = string_field(&raw, "ticketNumber");

        match (id, ticket_number) {
            (Some(id), Some(ticket_number)) => Ok(Self {
                id,
                ticket_number,
                raw,
            }),
            _ => Err(DeskError::MalformedResponse {
                status: 200,
                title: "ticket response is missing id or ticketNumber".to_string(),
                body: raw.to_string(),
            }),
        }
    }
}

/// An entry of the email delivery failure feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureAlert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    pub reason: String,
    pub raw: Value,
}

impl FailureAlert {
    /// Parse one alert entry. Entries without any reason get a generic one.
    pub fn from_value(raw: Value) -> Self {
        let ticket_number = string_field(&raw, "ticketNumber").or_else(|| {
            raw.get("ticket")
                .and_then(|t| string_field(t, "ticketNumber"))
        });
        let reason = ["reason", "errorMessage", "failureReason"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .unwrap_or("delivery failed")
            .to_string();

        Self {
            ticket_number,
            reason,
            raw,
        }
    }
}

/// Extract the `data` array of a list response. Missing or null means empty.
pub fn data_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Read a field that the helpdesk may send as either a string or a number.
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
