//! HTTP API tests against an in-process router with a mock helpdesk.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{json, Value};

use common::{fixtures, TestFixture};
use deskrelay_core::desk::DeskError;
use deskrelay_core::{JobEvent, StartBulkJob, TicketLog, TicketRecord};

fn bulk_request(profile: &str, emails: &[&str], delay: f64) -> StartBulkJob {
    serde_json::from_value(json!({
        "profile": profile,
        "emails": emails,
        "subject": "Maintenance window",
        "description": "<p>Scheduled maintenance tonight.</p>",
        "delay": delay,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_credentials() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    let profiles = response.body["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 2);
    for profile in profiles {
        assert_eq!(profile["credentials_configured"], true);
        assert!(profile.get("credentials").is_none());
    }

    let raw = response.body.to_string();
    assert!(!raw.contains("refresh-support"));
    assert!(!raw.contains("secret"));
}

#[tokio::test]
async fn test_list_profiles() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/profiles").await;

    assert_status!(response, StatusCode::OK);
    let names: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["billing", "support"]);
    assert_eq!(response.body[1]["sender_address"], "support@example.com");
    assert_eq!(response.body[1]["department_id"], "dept-support");
}

#[tokio::test]
async fn test_session_jobs_listing_tracks_status() {
    let fixture = TestFixture::new();
    let runner = fixture.state.runner();

    let empty = fixture.get("/api/v1/jobs/session-a").await;
    assert_status!(empty, StatusCode::OK);
    assert_eq!(empty.body, json!({"sessionId": "session-a", "jobs": []}));

    let handle = runner
        .start("session-a", bulk_request("support", &["a@x.com", "b@x.com"], 60.0))
        .await
        .expect("job should start");

    let running = fixture.get("/api/v1/jobs/session-a").await;
    assert_eq!(
        running.body["jobs"],
        json!([{"profile": "support", "status": "running"}])
    );

    assert!(runner.pause("session-a", "support").await);
    let paused = fixture.get("/api/v1/jobs/session-a").await;
    assert_eq!(paused.body["jobs"][0]["status"], "paused");

    // Other sessions do not see the job
    let other = fixture.get("/api/v1/jobs/session-b").await;
    assert_eq!(other.body["jobs"], json!([]));

    assert!(runner.end("session-a", "support").await);
    handle.await.unwrap();

    let after = fixture.get("/api/v1/jobs/session-a").await;
    assert_eq!(after.body["jobs"], json!([]));
}

#[tokio::test]
async fn test_failures_mapped_to_recipients() {
    let fixture = TestFixture::new();
    fixture
        .ticket_log
        .append(&TicketRecord {
            ticket_number: "4711".to_string(),
            email: "bounced@x.com".to_string(),
            profile: "support".to_string(),
            created_at: Utc::now(),
        })
        .unwrap();
    fixture
        .desk
        .set_failure_alerts(vec![
            json!({"ticketNumber": "4711", "reason": "Mailbox unavailable"}),
            json!({"ticket": {"ticketNumber": 9999}, "errorMessage": "Domain not found"}),
        ])
        .await;

    let response = fixture.get("/api/v1/profiles/support/failures").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["profile"], "support");
    let failures = response.body["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);

    assert_eq!(failures[0]["ticketNumber"], "4711");
    assert_eq!(failures[0]["email"], "bounced@x.com");
    assert_eq!(failures[0]["reason"], "Mailbox unavailable");

    // Tickets not created through this service have no known recipient
    assert_eq!(failures[1]["ticketNumber"], "9999");
    assert!(failures[1].get("email").is_none());
    assert_eq!(failures[1]["reason"], "Domain not found");

    let calls = fixture.desk.calls_for("failure_alerts").await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, "dept-support");
}

fn log_ticket(fixture: &TestFixture, number: &str, email: &str, profile: &str) {
    fixture
        .ticket_log
        .append(&TicketRecord {
            ticket_number: number.to_string(),
            email: email.to_string(),
            profile: profile.to_string(),
            created_at: Utc::now(),
        })
        .unwrap();
}

#[tokio::test]
async fn test_failures_resolve_recipient_within_profile() {
    let fixture = TestFixture::new();
    log_ticket(&fixture, "4711", "support-user@x.com", "support");
    log_ticket(&fixture, "4711", "billing-user@x.com", "billing");
    fixture
        .desk
        .set_failure_alerts(vec![json!({"ticketNumber": "4711", "reason": "Mailbox full"})])
        .await;

    let support = fixture.get("/api/v1/profiles/support/failures").await;
    assert_status!(support, StatusCode::OK);
    assert_eq!(support.body["failures"][0]["email"], "support-user@x.com");

    let billing = fixture.get("/api/v1/profiles/billing/failures").await;
    assert_status!(billing, StatusCode::OK);
    assert_eq!(billing.body["failures"][0]["email"], "billing-user@x.com");
}

#[tokio::test]
async fn test_list_logged_tickets() {
    let fixture = TestFixture::new();
    log_ticket(&fixture, "1", "first@x.com", "support");
    log_ticket(&fixture, "2", "other@x.com", "billing");
    log_ticket(&fixture, "3", "second@x.com", "support");

    let response = fixture.get("/api/v1/profiles/support/tickets").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["profile"], "support");
    let tickets = response.body["tickets"].as_array().unwrap();
    let numbers: Vec<&str> = tickets
        .iter()
        .map(|t| t["ticketNumber"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["3", "1"]);
    assert_eq!(tickets[0]["email"], "second@x.com");
    assert!(tickets[0]["createdAt"].is_string());

    let limited = fixture.get("/api/v1/profiles/support/tickets?limit=1").await;
    assert_eq!(limited.body["tickets"].as_array().unwrap().len(), 1);
    assert_eq!(limited.body["tickets"][0]["ticketNumber"], "3");
}

#[tokio::test]
async fn test_list_tickets_unknown_profile() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/profiles/nobody/tickets").await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "Profile not found: nobody");
}

#[tokio::test]
async fn test_failures_unknown_profile() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/profiles/nobody/failures").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "Profile not found: nobody");

    let response = fixture.delete("/api/v1/profiles/nobody/failures").await;
    assert_status!(response, StatusCode::NOT_FOUND);

    assert!(fixture.desk.calls().await.is_empty());
}

#[tokio::test]
async fn test_failures_upstream_error() {
    let fixture = TestFixture::new();
    fixture
        .desk
        .set_next_error(DeskError::Http {
            status: 401,
            message: "INVALID_OAUTH".to_string(),
            body: json!({"errorCode": "INVALID_OAUTH", "message": "The OAuth Token is invalid"}),
        })
        .await;

    let response = fixture.get("/api/v1/profiles/support/failures").await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["error"], "HTTP Error 401: INVALID_OAUTH");
    assert_eq!(response.body["fullResponse"]["errorCode"], "INVALID_OAUTH");
}

#[tokio::test]
async fn test_clear_failures() {
    let fixture = TestFixture::new();
    fixture
        .desk
        .set_failure_alerts(vec![json!({"ticketNumber": "1", "reason": "bounced"})])
        .await;

    let response = fixture.delete("/api/v1/profiles/billing/failures").await;
    assert_status!(response, StatusCode::NO_CONTENT);
    assert_eq!(response.body, Value::Null);

    let listed = fixture.get("/api/v1/profiles/billing/failures").await;
    assert_eq!(listed.body["failures"], json!([]));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let fixture = TestFixture::new();
    let mut events = fixture.subscribe();

    fixture
        .state
        .runner()
        .start("session-m", bulk_request("billing", &["m@x.com"], 0.0))
        .await
        .expect("job should start");
    loop {
        let envelope = common::next_event(&mut events).await;
        if envelope.event.is_terminal() {
            assert!(matches!(envelope.event, JobEvent::JobCompleted { .. }));
            break;
        }
    }
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("deskrelay_bulk_jobs_total"));
    assert!(body.contains("deskrelay_bulk_items_total"));
    assert!(body.contains("deskrelay_http_requests_total"));
    assert!(body.contains(r#"path="/api/v1/health""#));
}

#[tokio::test]
async fn test_created_tickets_are_logged() {
    let fixture = TestFixture::new();
    let mut events = fixture.subscribe();

    fixture
        .state
        .runner()
        .start("session-l", bulk_request("support", &["one@x.com", "two@x.com"], 0.0))
        .await
        .expect("job should start");
    loop {
        if common::next_event(&mut events).await.event.is_terminal() {
            break;
        }
    }

    let records = fixture.ticket_log.list_for_profile("support", 10).unwrap();
    let mut emails: Vec<&str> = records.iter().map(|r| r.email.as_str()).collect();
    emails.sort();
    assert_eq!(emails, vec!["one@x.com", "two@x.com"]);

    let profile = fixtures::profile("support");
    assert_eq!(
        fixture.desk.created_tickets().await[0].department_id,
        profile.department_id
    );
}
