//! REST implementation of [`HelpdeskApi`].

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::profile::Profile;

use super::client::DeskClient;
use super::types::{data_entries, CreatedTicket, FailureAlert, NewTicket, ReplyRequest};
use super::{DeskError, HelpdeskApi};

/// Helpdesk API over HTTP.
pub struct HttpHelpdesk {
    client: DeskClient,
}

impl HttpHelpdesk {
    pub fn new(client: DeskClient) -> Self {
        Self { client }
    }
}

fn ticket_path(ticket_id: &str, suffix: &str) -> String {
    format!("/tickets/{}/{}", urlencoding::encode(ticket_id), suffix)
}

#[async_trait]
impl HelpdeskApi for HttpHelpdesk {
    async fn create_ticket(
        &self,
        profile: &Profile,
        ticket: &NewTicket,
    ) -> Result<CreatedTicket, DeskError> {
        let body = serde_json::json!({
            "departmentId": ticket.department_id,
            "email": ticket.email,
            "subject": ticket.subject,
            "description": ticket.description,
            "contact": { "email": ticket.email },
        });

        let raw = self
            .client
            .call(Method::POST, "/tickets", &[], Some(&body), profile)
            .await?;

        CreatedTicket::from_response(raw)
    }

    async fn send_reply(
        &self,
        profile: &Profile,
        ticket_id: &str,
        reply: &ReplyRequest,
    ) -> Result<Value, DeskError> {
        let body = serde_json::to_value(reply)
            .map_err(|e| DeskError::Validation(format!("unserializable reply: {}", e)))?;

        self.client
            .call(
                Method::POST,
                &ticket_path(ticket_id, "sendReply"),
                &[],
                Some(&body),
                profile,
            )
            .await
    }

    async fn workflow_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError> {
        let value = self
            .client
            .call(
                Method::GET,
                &ticket_path(ticket_id, "workflowHistory"),
                &[],
                None,
                profile,
            )
            .await?;
        Ok(data_entries(value))
    }

    async fn notification_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError> {
        let value = self
            .client
            .call(
                Method::GET,
                &ticket_path(ticket_id, "notificationHistory"),
                &[],
                None,
                profile,
            )
            .await?;
        Ok(data_entries(value))
    }

    async fn failure_alerts(&self, profile: &Profile) -> Result<Vec<FailureAlert>, DeskError> {
        let value = self
            .client
            .call(
                Method::GET,
                "/emailFailureAlerts",
                &[("department", profile.department_id.as_str())],
                None,
                profile,
            )
            .await?;

        Ok(data_entries(value)
            .into_iter()
            .map(FailureAlert::from_value)
            .collect())
    }

    async fn clear_failure_alerts(&self, profile: &Profile) -> Result<(), DeskError> {
        self.client
            .call(
                Method::DELETE,
                "/emailFailureAlerts",
                &[("department", profile.department_id.as_str())],
                None,
                profile,
            )
            .await?;
        Ok(())
    }
}
