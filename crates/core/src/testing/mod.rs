//! Testing utilities and mock implementations.
//!
//! Mocks for the external seams of the job engine, so jobs can be driven
//! end to end without a real helpdesk or identity provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use deskrelay_core::testing::{fixtures, MockHelpdesk, MockTokenProvider};
//!
//! let desk = Arc::new(MockHelpdesk::new());
//! desk.set_failure_alerts(vec![json!({"ticketNumber": "100", "reason": "bounced"})]).await;
//!
//! let profiles = StaticProfiles::new(vec![fixtures::profile("support")]);
//! // Build a BulkJobRunner...
//! ```

mod mock_helpdesk;
mod mock_token_provider;

pub use mock_helpdesk::{MockHelpdesk, RecordedCall};
pub use mock_token_provider::MockTokenProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::json;

    use crate::desk::CreatedTicket;
    use crate::profile::{Profile, ProfileCredentials};

    /// A profile with complete credentials and a sender address.
    pub fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            org_id: "600000001".to_string(),
            department_id: format!("dept-{}", name),
            sender_address: Some(format!("{}@example.com", name)),
            credentials: ProfileCredentials {
                client_id: format!("client-{}", name),
                client_secret: "secret".to_string(),
                refresh_token: format!("refresh-{}", name),
            },
        }
    }

    /// A created ticket as the mock helpdesk would return it.
    pub fn created_ticket(ticket_number: &str) -> CreatedTicket {
        CreatedTicket {
            id: format!("id-{}", ticket_number),
            ticket_number: ticket_number.to_string(),
            raw: json!({
                "id": format!("id-{}", ticket_number),
                "ticketNumber": ticket_number,
            }),
        }
    }
}
