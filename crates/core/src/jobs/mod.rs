//! Bulk ticket jobs.
//!
//! A job sends one ticket per recipient for a profile, within one client
//! session. Jobs are controlled through the [`JobRegistry`] and report
//! progress through the [`EventEmitter`]. Created tickets can be verified
//! in the background by the [`VerificationPool`].

mod config;
mod events;
mod registry;
mod runner;
mod types;
mod verifier;

pub use config::JobsConfig;
pub use events::{EventEmitter, JobEvent, SessionEvent};
pub use registry::{JobControl, JobLease, JobRegistry};
pub use runner::BulkJobRunner;
pub use types::{ItemResult, JobError, JobKey, JobOutcome, JobStatus, StartBulkJob};
pub use verifier::{VerificationOutcome, VerificationPool, VerificationRequest};
