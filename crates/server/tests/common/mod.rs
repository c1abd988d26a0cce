//! Common test utilities for in-process API testing.
//!
//! The fixture wires a real router, job runner and ticket log around a
//! mock helpdesk, so handlers and WebSocket commands can be exercised
//! without any network access.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt;

use deskrelay_core::{
    config::{HistoryConfig, ServerConfig, TokenConfig},
    jobs::SessionEvent,
    testing::MockHelpdesk,
    BulkJobRunner, Config, DeskConfig, EventEmitter, HelpdeskApi, JobRegistry, JobsConfig,
    ProfileSource, SqliteTicketLog, StaticProfiles, TicketLog, VerificationPool,
};
use deskrelay_server::state::AppState;

/// Re-export fixtures for test convenience
pub use deskrelay_core::testing::fixtures;

/// Profiles configured in every fixture.
pub const PROFILES: [&str; 2] = ["billing", "support"];

/// Test fixture with a mock helpdesk behind the full application state.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub desk: Arc<MockHelpdesk>,
    pub ticket_log: Arc<SqliteTicketLog>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let desk = Arc::new(MockHelpdesk::new());
        let ticket_log =
            Arc::new(SqliteTicketLog::in_memory().expect("Failed to open ticket log"));

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            desk: DeskConfig::default(),
            token: TokenConfig::default(),
            jobs: JobsConfig {
                settle_delay_secs: 0,
                ..Default::default()
            },
            history: HistoryConfig::default(),
            profiles: PROFILES.iter().map(|name| fixtures::profile(name)).collect(),
        };

        let profiles: Arc<dyn ProfileSource> =
            Arc::new(StaticProfiles::new(config.profiles.iter().cloned()));
        let desk_api: Arc<dyn HelpdeskApi> = desk.clone();
        let log: Arc<dyn TicketLog> = ticket_log.clone();

        let events = EventEmitter::new(config.jobs.event_buffer);
        let verifier = VerificationPool::new(
            Arc::clone(&desk_api),
            events.clone(),
            config.jobs.max_concurrent_verifications,
            Duration::ZERO,
        );
        let runner = BulkJobRunner::new(
            Arc::clone(&profiles),
            Arc::clone(&desk_api),
            Arc::new(JobRegistry::new()),
            events,
            Arc::clone(&log),
            verifier,
        );

        let state = Arc::new(AppState::new(config, profiles, desk_api, log, runner));
        let router = deskrelay_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            desk,
            ticket_log,
        }
    }

    /// Subscribe to every job event the runner emits.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.runner().events().subscribe()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let (status, bytes) = self.send("GET", path).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let (status, body_bytes) = self.send(method, path).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, method: &str, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, bytes.to_vec())
    }
}

/// Receive the next event, failing the test if none arrives in time.
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event channel closed")
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
