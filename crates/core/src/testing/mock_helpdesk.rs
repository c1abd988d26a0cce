//! Mock helpdesk for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::desk::{
    CreatedTicket, DeskError, FailureAlert, HelpdeskApi, NewTicket, ReplyRequest,
};
use crate::profile::Profile;

/// A recorded helpdesk call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Operation name, e.g. `create_ticket`.
    pub operation: &'static str,
    /// Profile the call was made for.
    pub profile: String,
    /// Recipient email for creations, ticket id for ticket calls,
    /// department id for alert calls.
    pub target: String,
}

/// Mock implementation of the HelpdeskApi trait.
///
/// Provides controllable behavior for testing:
/// - Created tickets are numbered from 100 with ids `id-{number}`
/// - Per-recipient creation and reply failures
/// - Scripted histories and failure alerts
/// - A one-shot error for the next call of any kind
/// - Simulated latency
///
/// # Example
///
/// ```rust,ignore
/// use deskrelay_core::testing::MockHelpdesk;
///
/// let desk = MockHelpdesk::new();
/// desk.fail_create_for("b@x.com", DeskError::Network("reset".into())).await;
///
/// // Run a job...
///
/// let created = desk.created_tickets().await;
/// assert_eq!(created.len(), 2);
/// ```
#[derive(Debug)]
pub struct MockHelpdesk {
    /// Every call made, in order.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Tickets successfully created.
    created: Arc<RwLock<Vec<NewTicket>>>,
    /// Replies successfully sent.
    replies: Arc<RwLock<Vec<ReplyRequest>>>,
    /// Creation failures by recipient.
    create_failures: Arc<RwLock<HashMap<String, DeskError>>>,
    /// Reply failures by recipient.
    reply_failures: Arc<RwLock<HashMap<String, DeskError>>>,
    /// Workflow history by ticket id.
    workflow: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    /// Notification history by ticket id.
    notifications: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    /// Current failure alert feed.
    alerts: Arc<RwLock<Vec<Value>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<DeskError>>>,
    /// Simulated latency of every call.
    call_delay: Arc<RwLock<Duration>>,
    next_number: AtomicU64,
}

impl Default for MockHelpdesk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHelpdesk {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            replies: Arc::new(RwLock::new(Vec::new())),
            create_failures: Arc::new(RwLock::new(HashMap::new())),
            reply_failures: Arc::new(RwLock::new(HashMap::new())),
            workflow: Arc::new(RwLock::new(HashMap::new())),
            notifications: Arc::new(RwLock::new(HashMap::new())),
            alerts: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            call_delay: Arc::new(RwLock::new(Duration::ZERO)),
            next_number: AtomicU64::new(100),
        }
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Recorded calls of one operation.
    pub async fn calls_for(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Tickets successfully created, in order.
    pub async fn created_tickets(&self) -> Vec<NewTicket> {
        self.created.read().await.clone()
    }

    /// Replies successfully sent, in order.
    pub async fn sent_replies(&self) -> Vec<ReplyRequest> {
        self.replies.read().await.clone()
    }

    /// Number of workflow history lookups.
    pub async fn history_lookup_count(&self) -> usize {
        self.calls_for("workflow_history").await.len()
    }

    /// Make ticket creation for this recipient fail.
    pub async fn fail_create_for(&self, email: &str, error: DeskError) {
        self.create_failures
            .write()
            .await
            .insert(email.to_string(), error);
    }

    /// Make replies to this recipient fail.
    pub async fn fail_reply_to(&self, email: &str, error: DeskError) {
        self.reply_failures
            .write()
            .await
            .insert(email.to_string(), error);
    }

    pub async fn set_workflow_history(&self, ticket_id: &str, entries: Vec<Value>) {
        self.workflow
            .write()
            .await
            .insert(ticket_id.to_string(), entries);
    }

    pub async fn set_notification_history(&self, ticket_id: &str, entries: Vec<Value>) {
        self.notifications
            .write()
            .await
            .insert(ticket_id.to_string(), entries);
    }

    /// Replace the failure alert feed with raw entries.
    pub async fn set_failure_alerts(&self, alerts: Vec<Value>) {
        *self.alerts.write().await = alerts;
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: DeskError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated latency of every call.
    pub async fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.write().await = delay;
    }

    /// Record a call, simulate latency and take the pending error.
    async fn begin(
        &self,
        operation: &'static str,
        profile: &Profile,
        target: &str,
    ) -> Result<(), DeskError> {
        self.calls.write().await.push(RecordedCall {
            operation,
            profile: profile.name.clone(),
            target: target.to_string(),
        });

        let delay = *self.call_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HelpdeskApi for MockHelpdesk {
    async fn create_ticket(
        &self,
        profile: &Profile,
        ticket: &NewTicket,
    ) -> Result<CreatedTicket, DeskError> {
        self.begin("create_ticket", profile, &ticket.email).await?;

        if let Some(err) = self.create_failures.read().await.get(&ticket.email) {
            return Err(err.clone());
        }

        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        self.created.write().await.push(ticket.clone());

        Ok(CreatedTicket {
            id: format!("id-{}", number),
            ticket_number: number.to_string(),
            raw: json!({
                "id": format!("id-{}", number),
                "ticketNumber": number.to_string(),
                "email": ticket.email,
                "subject": ticket.subject,
                "departmentId": ticket.department_id,
            }),
        })
    }

    async fn send_reply(
        &self,
        profile: &Profile,
        ticket_id: &str,
        reply: &ReplyRequest,
    ) -> Result<Value, DeskError> {
        self.begin("send_reply", profile, ticket_id).await?;

        if let Some(err) = self.reply_failures.read().await.get(&reply.to) {
            return Err(err.clone());
        }

        self.replies.write().await.push(reply.clone());
        Ok(json!({ "id": format!("reply-{}", ticket_id), "status": "SUCCESS" }))
    }

    async fn workflow_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError> {
        self.begin("workflow_history", profile, ticket_id).await?;
        Ok(self
            .workflow
            .read()
            .await
            .get(ticket_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn notification_history(
        &self,
        profile: &Profile,
        ticket_id: &str,
    ) -> Result<Vec<Value>, DeskError> {
        self.begin("notification_history", profile, ticket_id).await?;
        Ok(self
            .notifications
            .read()
            .await
            .get(ticket_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn failure_alerts(&self, profile: &Profile) -> Result<Vec<FailureAlert>, DeskError> {
        self.begin("failure_alerts", profile, &profile.department_id)
            .await?;
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .cloned()
            .map(FailureAlert::from_value)
            .collect())
    }

    async fn clear_failure_alerts(&self, profile: &Profile) -> Result<(), DeskError> {
        self.begin("clear_failure_alerts", profile, &profile.department_id)
            .await?;
        self.alerts.write().await.clear();
        Ok(())
    }
}
