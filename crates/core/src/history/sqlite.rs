//! SQLite-backed ticket log.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{HistoryError, TicketLog, TicketRecord};

/// SQLite-backed ticket log.
pub struct SqliteTicketLog {
    conn: Mutex<Connection>,
}

impl SqliteTicketLog {
    /// Open the log, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory log (useful for testing).
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticket_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_number TEXT NOT NULL,
                email TEXT NOT NULL,
                profile TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ticket_log_profile_number
                ON ticket_log(profile, ticket_number);
            "#,
        )
        .map_err(|e| HistoryError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, HistoryError> {
        self.conn
            .lock()
            .map_err(|e| HistoryError::Database(format!("lock poisoned: {}", e)))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRecord> {
        let created_at: String = row.get(3)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(TicketRecord {
            ticket_number: row.get(0)?,
            email: row.get(1)?,
            profile: row.get(2)?,
            created_at,
        })
    }
}

impl TicketLog for SqliteTicketLog {
    fn append(&self, record: &TicketRecord) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ticket_log (ticket_number, email, profile, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.ticket_number,
                record.email,
                record.profile,
                record.created_at.to_rfc3339()
            ],
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;
        Ok(())
    }

    fn find(&self, profile: &str, ticket_number: &str) -> Result<Option<TicketRecord>, HistoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT ticket_number, email, profile, created_at FROM ticket_log
             WHERE profile = ?1 AND ticket_number = ?2 ORDER BY id DESC LIMIT 1",
            params![profile, ticket_number],
            Self::row_to_record,
        )
        .optional()
        .map_err(|e| HistoryError::Database(e.to_string()))
    }

    fn list_for_profile(&self, profile: &str, limit: i64) -> Result<Vec<TicketRecord>, HistoryError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticket_number, email, profile, created_at FROM ticket_log
                 WHERE profile = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![profile, limit], Self::row_to_record)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| HistoryError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(number: &str, email: &str, profile: &str) -> TicketRecord {
        TicketRecord {
            ticket_number: number.to_string(),
            email: email.to_string(),
            profile: profile.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_find() {
        let log = SqliteTicketLog::in_memory().unwrap();
        log.append(&record("100", "a@x.com", "support")).unwrap();

        let found = log.find("support", "100").unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert_eq!(found.profile, "support");
        assert!(log.find("support", "999").unwrap().is_none());
    }

    #[test]
    fn test_find_returns_latest_entry() {
        let log = SqliteTicketLog::in_memory().unwrap();
        log.append(&record("100", "old@x.com", "support")).unwrap();
        log.append(&record("100", "new@x.com", "support")).unwrap();

        let found = log.find("support", "100").unwrap().unwrap();
        assert_eq!(found.email, "new@x.com");
    }

    #[test]
    fn test_find_is_scoped_to_profile() {
        let log = SqliteTicketLog::in_memory().unwrap();
        log.append(&record("4711", "support@x.com", "support")).unwrap();
        log.append(&record("4711", "billing@x.com", "billing")).unwrap();

        assert_eq!(log.find("support", "4711").unwrap().unwrap().email, "support@x.com");
        assert_eq!(log.find("billing", "4711").unwrap().unwrap().email, "billing@x.com");
        assert!(log.find("sales", "4711").unwrap().is_none());
    }

    #[test]
    fn test_list_for_profile_newest_first() {
        let log = SqliteTicketLog::in_memory().unwrap();
        log.append(&record("1", "a@x.com", "support")).unwrap();
        log.append(&record("2", "b@x.com", "billing")).unwrap();
        log.append(&record("3", "c@x.com", "support")).unwrap();

        let records = log.list_for_profile("support", 10).unwrap();
        let numbers: Vec<_> = records.iter().map(|r| r.ticket_number.as_str()).collect();
        assert_eq!(numbers, vec!["3", "1"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");

        {
            let log = SqliteTicketLog::new(&path).unwrap();
            log.append(&record("100", "a@x.com", "support")).unwrap();
        }

        let log = SqliteTicketLog::new(&path).unwrap();
        assert!(log.find("support", "100").unwrap().is_some());
    }
}
