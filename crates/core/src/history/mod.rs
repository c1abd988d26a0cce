//! Durable append-only log of created tickets.
//!
//! Every successful creation records `{ticket_number, email}` so failure
//! alerts, which only carry a ticket number, can be mapped back to the
//! original recipient.

mod sqlite;

pub use sqlite::SqliteTicketLog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),
}

/// One logged ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketRecord {
    pub ticket_number: String,
    pub email: String,
    pub profile: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for the ticket log.
pub trait TicketLog: Send + Sync {
    /// Append a record.
    fn append(&self, record: &TicketRecord) -> Result<(), HistoryError>;

    /// Most recent record for a ticket number issued under `profile`.
    fn find(&self, profile: &str, ticket_number: &str) -> Result<Option<TicketRecord>, HistoryError>;

    /// Records of one profile, newest first.
    fn list_for_profile(&self, profile: &str, limit: i64) -> Result<Vec<TicketRecord>, HistoryError>;
}
