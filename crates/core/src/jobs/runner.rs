//! Bulk job runner.
//!
//! A job processes its recipients strictly in order, one ticket each:
//! - Before every item it honors end and pause, and waits the configured
//!   delay between items. The delay wakes early when the job is ended.
//! - Each item creates a ticket, optionally sends a direct reply, logs the
//!   ticket number, emits `item-result` and optionally queues verification.
//! - Exactly one terminal event closes the job: `job-completed`,
//!   `job-ended` or `job-error`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::desk::{CreatedTicket, ErrorInfo, HelpdeskApi, NewTicket, ReplyRequest};
use crate::history::{TicketLog, TicketRecord};
use crate::metrics::{BULK_ITEMS, BULK_JOBS};
use crate::profile::{Profile, ProfileSource};

use super::events::{EventEmitter, JobEvent};
use super::registry::{JobControl, JobLease, JobRegistry};
use super::types::{ItemResult, JobError, JobKey, JobOutcome, JobStatus, StartBulkJob};
use super::verifier::{VerificationPool, VerificationRequest};

/// Everything a job needs once its request has been validated.
struct JobPlan {
    profile: Arc<Profile>,
    recipients: Vec<String>,
    /// Set when direct replies are requested.
    reply_from: Option<String>,
    delay: Duration,
}

struct ProcessedItem {
    result: ItemResult,
    created: Option<CreatedTicket>,
    label: &'static str,
}

/// Starts and drives bulk jobs. Cheaply cloneable.
#[derive(Clone)]
pub struct BulkJobRunner {
    profiles: Arc<dyn ProfileSource>,
    desk: Arc<dyn HelpdeskApi>,
    registry: Arc<JobRegistry>,
    events: EventEmitter,
    ticket_log: Arc<dyn TicketLog>,
    verifier: VerificationPool,
}

impl BulkJobRunner {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        desk: Arc<dyn HelpdeskApi>,
        registry: Arc<JobRegistry>,
        events: EventEmitter,
        ticket_log: Arc<dyn TicketLog>,
        verifier: VerificationPool,
    ) -> Self {
        Self {
            profiles,
            desk,
            registry,
            events,
            ticket_log,
            verifier,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Register a job and spawn it.
    ///
    /// A duplicate start for a live job emits `job-error` and leaves the
    /// live job untouched; no task is spawned in that case.
    ///
    /// The job body runs in its own task. If it panics, the registration
    /// is still released and `job-error` is emitted.
    pub async fn start(
        &self,
        session_id: &str,
        request: StartBulkJob,
    ) -> Option<JoinHandle<JobOutcome>> {
        let key = JobKey::new(session_id, &request.profile);
        let control = match self.registry.create(key.clone()).await {
            Ok(control) => control,
            Err(e) => {
                warn!(job = %key, error = %e, "Rejected job start");
                BULK_JOBS.with_label_values(&["error"]).inc();
                self.events.emit(
                    session_id,
                    JobEvent::JobError {
                        profile: request.profile,
                        message: e.to_string(),
                    },
                );
                return None;
            }
        };

        info!(
            job = %key,
            recipients = request.emails.len(),
            send_reply = request.send_reply,
            verify = request.verify,
            "Starting bulk job"
        );

        let lease = control.lease();
        let runner = self.clone();
        Some(tokio::spawn(async move {
            let driver = runner.clone();
            let body = tokio::spawn(async move { driver.drive(control, request).await });
            let outcome = match body.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job = %lease.key(), error = %e, "Bulk job task failed");
                    JobOutcome::Error(format!("job task failed: {}", e))
                }
            };
            runner.finish(&lease, outcome).await
        }))
    }

    /// Pause a job. Returns false if no such job exists.
    pub async fn pause(&self, session_id: &str, profile: &str) -> bool {
        self.registry
            .set_status(&JobKey::new(session_id, profile), JobStatus::Paused)
            .await
    }

    /// Resume a paused job. Returns false if no such job exists.
    pub async fn resume(&self, session_id: &str, profile: &str) -> bool {
        self.registry
            .set_status(&JobKey::new(session_id, profile), JobStatus::Running)
            .await
    }

    /// End a job. It stops before its next item. Returns false if no such job exists.
    pub async fn end(&self, session_id: &str, profile: &str) -> bool {
        self.registry
            .set_status(&JobKey::new(session_id, profile), JobStatus::Ended)
            .await
    }

    async fn drive(self, mut control: JobControl, request: StartBulkJob) -> JobOutcome {
        match self.plan(&request) {
            Ok(plan) => self.process(&mut control, &request, plan).await,
            Err(e) => {
                warn!(job = %control.key(), error = %e, "Bulk job failed to start");
                JobOutcome::Error(e.to_string())
            }
        }
    }

    /// Release the registration and emit the terminal event.
    async fn finish(&self, lease: &JobLease, outcome: JobOutcome) -> JobOutcome {
        let key = lease.key().clone();
        self.registry.release(lease).await;
        BULK_JOBS.with_label_values(&[outcome.label()]).inc();
        info!(job = %key, outcome = outcome.label(), "Bulk job finished");

        let profile = key.profile_name;
        let event = match &outcome {
            JobOutcome::Completed => JobEvent::JobCompleted { profile },
            JobOutcome::Ended => JobEvent::JobEnded { profile },
            JobOutcome::Error(message) => JobEvent::JobError {
                profile,
                message: message.clone(),
            },
        };
        self.events.emit(&key.session_id, event);

        outcome
    }

    fn plan(&self, request: &StartBulkJob) -> Result<JobPlan, JobError> {
        let profile = self
            .profiles
            .get(&request.profile)
            .ok_or_else(|| JobError::ProfileNotFound(request.profile.clone()))?;

        let reply_from = if request.send_reply {
            match profile.sender_address.as_deref().map(str::trim) {
                Some(address) if !address.is_empty() => Some(address.to_string()),
                _ => return Err(JobError::MissingSenderAddress(profile.name.clone())),
            }
        } else {
            None
        };

        let recipients = request.recipients();
        if recipients.is_empty() {
            return Err(JobError::NoRecipients);
        }

        Ok(JobPlan {
            profile,
            recipients,
            reply_from,
            delay: request.delay()?,
        })
    }

    async fn process(
        &self,
        control: &mut JobControl,
        request: &StartBulkJob,
        plan: JobPlan,
    ) -> JobOutcome {
        let session_id = control.key().session_id.clone();
        let delay = plan.delay;
        // Cancelled only when the job is stopped; verifications of a
        // completed job run to the end.
        let cancel = CancellationToken::new();
        let total = plan.recipients.len();

        for (index, email) in plan.recipients.iter().enumerate() {
            if !Self::ready_for_item(control, index, delay).await {
                info!(job = %control.key(), processed = index, total, "Bulk job ended early");
                cancel.cancel();
                return JobOutcome::Ended;
            }

            debug!(job = %control.key(), email = %email, index, total, "Processing item");
            let item = self.process_item(&plan, request, email).await;
            BULK_ITEMS.with_label_values(&[item.label]).inc();

            self.events.emit(
                &session_id,
                JobEvent::ItemResult {
                    profile: plan.profile.name.clone(),
                    result: item.result,
                },
            );

            if request.verify {
                if let Some(ticket) = item.created {
                    self.verifier.submit(
                        VerificationRequest {
                            session_id: session_id.clone(),
                            profile: Arc::clone(&plan.profile),
                            ticket,
                        },
                        cancel.clone(),
                    );
                }
            }
        }

        // An end that arrived while the last item was in flight.
        if control.is_ended() {
            info!(job = %control.key(), processed = total, total, "Bulk job ended after last item");
            cancel.cancel();
            return JobOutcome::Ended;
        }

        JobOutcome::Completed
    }

    /// Honor end, pause and the inter-item delay. False once the job should stop.
    async fn ready_for_item(control: &mut JobControl, index: usize, delay: Duration) -> bool {
        if !Self::wait_until_runnable(control).await {
            return false;
        }

        if index > 0 && !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = control.ended() => {}
            }
            // A pause that arrived during the delay holds the item here.
            if !Self::wait_until_runnable(control).await {
                return false;
            }
        }

        true
    }

    async fn wait_until_runnable(control: &mut JobControl) -> bool {
        loop {
            match control.status() {
                JobStatus::Running => return true,
                JobStatus::Ended => return false,
                JobStatus::Paused => {
                    debug!(job = %control.key(), "Job paused");
                    control.wait_while_paused().await;
                }
            }
        }
    }

    async fn process_item(&self, plan: &JobPlan, request: &StartBulkJob, email: &str) -> ProcessedItem {
        let profile = plan.profile.as_ref();
        let ticket = NewTicket {
            department_id: profile.department_id.clone(),
            email: email.to_string(),
            subject: request.subject.clone(),
            description: request.description.clone(),
        };

        let created = match self.desk.create_ticket(profile, &ticket).await {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    profile = %profile.name,
                    email,
                    status = ?e.status(),
                    error = %e,
                    "Ticket creation failed"
                );
                return ProcessedItem {
                    result: ItemResult::failure(email, ErrorInfo::from(&e)),
                    created: None,
                    label: "failed",
                };
            }
        };

        self.record_ticket(profile, email, &created);

        let mut details = format!("Ticket #{} created", created.ticket_number);
        let mut full_response = Map::new();
        full_response.insert("ticketCreate".to_string(), created.raw.clone());
        let mut label = "success";

        if let Some(from) = &plan.reply_from {
            let reply = ReplyRequest::email(from.clone(), email, request.description.clone());
            match self.desk.send_reply(profile, &created.id, &reply).await {
                Ok(response) => {
                    details.push_str(" and reply sent");
                    full_response.insert("sendReply".to_string(), response);
                }
                Err(e) => {
                    warn!(
                        ticket = %created.ticket_number,
                        error = %e,
                        "Reply failed after ticket creation"
                    );
                    let info = ErrorInfo::from(&e);
                    details = format!(
                        "Ticket #{} created, but reply failed: {}",
                        created.ticket_number, info.message
                    );
                    full_response.insert(
                        "sendReply".to_string(),
                        json!({ "error": info.message, "fullResponse": info.full_response }),
                    );
                    label = "partial";
                }
            }
        }

        ProcessedItem {
            result: ItemResult {
                email: email.to_string(),
                success: true,
                ticket_number: Some(created.ticket_number.clone()),
                details,
                full_response: Some(Value::Object(full_response)),
                error: None,
            },
            created: Some(created),
            label,
        }
    }

    fn record_ticket(&self, profile: &Profile, email: &str, created: &CreatedTicket) {
        let record = TicketRecord {
            ticket_number: created.ticket_number.clone(),
            email: email.to_string(),
            profile: profile.name.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.ticket_log.append(&record) {
            warn!(ticket = %created.ticket_number, error = %e, "Failed to log created ticket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::DeskError;
    use crate::history::SqliteTicketLog;
    use crate::profile::StaticProfiles;
    use crate::testing::{fixtures, MockHelpdesk};

    struct Harness {
        runner: BulkJobRunner,
        desk: Arc<MockHelpdesk>,
        log: Arc<SqliteTicketLog>,
    }

    fn harness() -> Harness {
        let desk = Arc::new(MockHelpdesk::new());
        let log = Arc::new(SqliteTicketLog::in_memory().unwrap());
        let events = EventEmitter::new(64);
        let mut no_sender = fixtures::profile("nosender");
        no_sender.sender_address = None;
        let profiles = Arc::new(StaticProfiles::new(vec![
            fixtures::profile("support"),
            no_sender,
        ]));
        let verifier = VerificationPool::new(desk.clone(), events.clone(), 4, Duration::from_secs(10));
        let runner = BulkJobRunner::new(
            profiles,
            desk.clone(),
            Arc::new(JobRegistry::new()),
            events,
            log.clone(),
            verifier,
        );
        Harness { runner, desk, log }
    }

    fn request(profile: &str, emails: &[&str]) -> StartBulkJob {
        StartBulkJob {
            profile: profile.to_string(),
            emails: emails.iter().map(|e| e.to_string()).collect(),
            subject: "Subject".to_string(),
            description: "Body".to_string(),
            delay: 0.0,
            send_reply: false,
            verify: false,
        }
    }

    #[tokio::test]
    async fn test_items_processed_in_order_and_logged() {
        let h = harness();
        let outcome = h
            .runner
            .start("s1", request("support", &["a@x.com", "b@x.com"]))
            .await
            .unwrap()
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::Completed);
        let created: Vec<_> = h
            .desk
            .created_tickets()
            .await
            .into_iter()
            .map(|t| t.email)
            .collect();
        assert_eq!(created, vec!["a@x.com", "b@x.com"]);

        let record = h.log.find("support", "100").unwrap().unwrap();
        assert_eq!(record.email, "a@x.com");
        assert!(!h.runner.registry().exists(&JobKey::new("s1", "support")).await);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_job_error() {
        let h = harness();
        let mut rx = h.runner.events().subscribe();

        let outcome = h
            .runner
            .start("s1", request("missing", &["a@x.com"]))
            .await
            .unwrap()
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Error(_)));
        let event = rx.recv().await.unwrap().event;
        assert!(matches!(event, JobEvent::JobError { .. }));
        assert!(h.desk.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_reply_without_sender_is_job_error() {
        let h = harness();
        let mut req = request("nosender", &["a@x.com"]);
        req.send_reply = true;

        let outcome = h.runner.start("s1", req).await.unwrap().await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Error(JobError::MissingSenderAddress("nosender".to_string()).to_string())
        );
        assert!(h.desk.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_recipients_is_job_error() {
        let h = harness();
        let outcome = h
            .runner
            .start("s1", request("support", &["", "  "]))
            .await
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Error(JobError::NoRecipients.to_string()));
    }

    #[tokio::test]
    async fn test_reply_failure_keeps_item_successful() {
        let h = harness();
        h.desk
            .fail_reply_to(
                "a@x.com",
                DeskError::Http {
                    status: 403,
                    message: "Forbidden".to_string(),
                    body: Value::Null,
                },
            )
            .await;
        let mut rx = h.runner.events().subscribe();
        let mut req = request("support", &["a@x.com"]);
        req.send_reply = true;

        h.runner.start("s1", req).await.unwrap().await.unwrap();

        match rx.recv().await.unwrap().event {
            JobEvent::ItemResult { result, .. } => {
                assert!(result.success);
                assert_eq!(
                    result.details,
                    "Ticket #100 created, but reply failed: HTTP Error 403: Forbidden"
                );
                let full = result.full_response.unwrap();
                assert_eq!(full["sendReply"]["error"], "HTTP Error 403: Forbidden");
                assert!(full.get("ticketCreate").is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reply_uses_profile_sender() {
        let h = harness();
        let mut req = request("support", &["a@x.com"]);
        req.send_reply = true;

        h.runner.start("s1", req).await.unwrap().await.unwrap();

        let replies = h.desk.sent_replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].to, "a@x.com");
        assert_eq!(replies[0].from_email_address, "support@example.com");
        assert_eq!(replies[0].content, "Body");
    }

    #[tokio::test]
    async fn test_out_of_range_delay_is_job_error() {
        let h = harness();
        let mut req = request("support", &["a@x.com", "b@x.com"]);
        req.delay = 1e30;

        let outcome = h.runner.start("s1", req).await.unwrap().await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Error(JobError::InvalidDelay(1e30).to_string())
        );
        assert!(h.desk.calls().await.is_empty());
        assert!(h.runner.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_pause_resume_helpers_report_missing_jobs() {
        let h = harness();
        assert!(!h.runner.pause("s1", "support").await);
        assert!(!h.runner.resume("s1", "support").await);
        assert!(!h.runner.end("s1", "support").await);
    }
}
