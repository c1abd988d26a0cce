//! Post-creation delivery verification.
//!
//! Each created ticket gets one background verification: wait for the
//! settle delay, read the ticket's workflow and notification histories,
//! and fall back to the department's failure alerts when both are empty.
//! Exactly one `item-update` event is emitted per verification, whatever
//! the outcome.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::desk::{CreatedTicket, ErrorInfo, HelpdeskApi};
use crate::metrics::VERIFICATIONS;
use crate::profile::Profile;

use super::events::{EventEmitter, JobEvent};

/// A ticket awaiting verification.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub session_id: String,
    pub profile: Arc<Profile>,
    pub ticket: CreatedTicket,
}

/// Result of verifying one ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// History entries show the ticket was processed.
    Verified { entries: usize },
    /// A failure alert names this ticket.
    DeliveryFailed { reason: String },
    /// No history and no matching alert.
    Unverifiable,
    /// A lookup call failed.
    LookupFailed { message: String },
    /// The owning job stopped before verification finished.
    Cancelled,
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified { .. } => "verified",
            VerificationOutcome::DeliveryFailed { .. } => "delivery_failed",
            VerificationOutcome::Unverifiable => "unverifiable",
            VerificationOutcome::LookupFailed { .. } => "lookup_failed",
            VerificationOutcome::Cancelled => "cancelled",
        }
    }

    pub fn details(&self, ticket_number: &str) -> String {
        match self {
            VerificationOutcome::Verified { entries } => format!(
                "Ticket #{} verified: {} history entries found",
                ticket_number, entries
            ),
            VerificationOutcome::DeliveryFailed { reason } => {
                format!("Ticket #{} delivery failed: {}", ticket_number, reason)
            }
            VerificationOutcome::Unverifiable => format!(
                "Ticket #{} could not be verified: no history or failure alert found",
                ticket_number
            ),
            VerificationOutcome::LookupFailed { message } => {
                format!("Ticket #{} verification failed: {}", ticket_number, message)
            }
            VerificationOutcome::Cancelled => {
                format!("Ticket #{} verification cancelled: job ended", ticket_number)
            }
        }
    }
}

/// Runs verifications in the background with bounded concurrency.
///
/// The semaphore bounds concurrent lookups, not waiting verifications:
/// the settle delay elapses before a permit is requested.
#[derive(Clone)]
pub struct VerificationPool {
    desk: Arc<dyn HelpdeskApi>,
    events: EventEmitter,
    permits: Arc<Semaphore>,
    settle_delay: Duration,
}

impl VerificationPool {
    pub fn new(
        desk: Arc<dyn HelpdeskApi>,
        events: EventEmitter,
        max_concurrent: usize,
        settle_delay: Duration,
    ) -> Self {
        Self {
            desk,
            events,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            settle_delay,
        }
    }

    /// Spawn a verification. The returned handle resolves after its
    /// `item-update` event has been emitted.
    pub fn submit(
        &self,
        request: VerificationRequest,
        cancel: CancellationToken,
    ) -> JoinHandle<VerificationOutcome> {
        let pool = self.clone();
        tokio::spawn(async move { pool.verify(request, cancel).await })
    }

    /// Verify one ticket and emit its `item-update` event.
    pub async fn verify(
        &self,
        request: VerificationRequest,
        cancel: CancellationToken,
    ) -> VerificationOutcome {
        let ticket_number = request.ticket.ticket_number.clone();
        let mut diagnostics = Map::new();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => VerificationOutcome::Cancelled,
            outcome = self.run_checks(&request, &mut diagnostics) => outcome,
        };

        VERIFICATIONS.with_label_values(&[outcome.label()]).inc();
        match &outcome {
            VerificationOutcome::Verified { entries } => {
                info!(ticket = %ticket_number, entries, "Ticket verified");
            }
            VerificationOutcome::LookupFailed { message } => {
                warn!(ticket = %ticket_number, error = %message, "Verification lookup failed");
            }
            other => {
                info!(ticket = %ticket_number, outcome = other.label(), "Verification finished");
            }
        }

        self.events.emit(
            &request.session_id,
            JobEvent::ItemUpdate {
                profile: request.profile.name.clone(),
                ticket_number: ticket_number.clone(),
                success: outcome.is_success(),
                details: outcome.details(&ticket_number),
                full_response: Value::Object(diagnostics),
            },
        );

        outcome
    }

    async fn run_checks(
        &self,
        request: &VerificationRequest,
        diagnostics: &mut Map<String, Value>,
    ) -> VerificationOutcome {
        tokio::time::sleep(self.settle_delay).await;

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return VerificationOutcome::LookupFailed {
                    message: "verification pool closed".to_string(),
                }
            }
        };

        let profile = request.profile.as_ref();
        let ticket_id = request.ticket.id.as_str();
        debug!(ticket = %request.ticket.ticket_number, "Checking delivery history");

        let (workflow, notifications) = tokio::join!(
            self.desk.workflow_history(profile, ticket_id),
            self.desk.notification_history(profile, ticket_id),
        );

        let (workflow, notifications) = match (workflow, notifications) {
            (Ok(w), Ok(n)) => (w, n),
            (Err(e), _) | (_, Err(e)) => {
                let info = ErrorInfo::from(&e);
                diagnostics.insert("error".to_string(), json!(info));
                return VerificationOutcome::LookupFailed {
                    message: info.message,
                };
            }
        };

        let mut history = workflow;
        history.extend(notifications);
        let entries = history.len();
        diagnostics.insert("history".to_string(), Value::Array(history));

        if entries > 0 {
            return VerificationOutcome::Verified { entries };
        }

        let alerts = match self.desk.failure_alerts(profile).await {
            Ok(alerts) => alerts,
            Err(e) => {
                let info = ErrorInfo::from(&e);
                diagnostics.insert("error".to_string(), json!(info));
                return VerificationOutcome::LookupFailed {
                    message: info.message,
                };
            }
        };

        let ticket_number = request.ticket.ticket_number.as_str();
        match alerts
            .into_iter()
            .find(|alert| alert.ticket_number.as_deref() == Some(ticket_number))
        {
            Some(alert) => {
                diagnostics.insert("failureAlert".to_string(), alert.raw);
                VerificationOutcome::DeliveryFailed {
                    reason: alert.reason,
                }
            }
            None => VerificationOutcome::Unverifiable,
        }
    }
}
