//! Events emitted to the session that started a job.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::types::ItemResult;

/// Progress and outcome events of a bulk job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobEvent {
    /// One item finished processing.
    #[serde(rename_all = "camelCase")]
    ItemResult {
        profile: String,
        #[serde(flatten)]
        result: ItemResult,
    },
    /// Verification of a created ticket finished.
    #[serde(rename_all = "camelCase")]
    ItemUpdate {
        profile: String,
        ticket_number: String,
        success: bool,
        details: String,
        full_response: Value,
    },
    /// All items were processed.
    JobCompleted { profile: String },
    /// The job was stopped before finishing.
    JobEnded { profile: String },
    /// The job could not start.
    JobError { profile: String, message: String },
}

impl JobEvent {
    pub fn profile(&self) -> &str {
        match self {
            JobEvent::ItemResult { profile, .. }
            | JobEvent::ItemUpdate { profile, .. }
            | JobEvent::JobCompleted { profile }
            | JobEvent::JobEnded { profile }
            | JobEvent::JobError { profile, .. } => profile,
        }
    }

    /// Whether this event closes the job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::JobCompleted { .. } | JobEvent::JobEnded { .. } | JobEvent::JobError { .. }
        )
    }
}

/// A job event addressed to one session.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: String,
    pub event: JobEvent,
}

/// Fan-out of job events to session subscribers.
///
/// Cheaply cloneable. Emitting never blocks; events with no subscriber
/// are dropped.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, session_id: &str, event: JobEvent) {
        let envelope = SessionEvent {
            session_id: session_id.to_string(),
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(session_id, "No subscribers for job event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
