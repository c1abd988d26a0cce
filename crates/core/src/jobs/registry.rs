//! Registry of live jobs and their control status.
//!
//! Each entry owns the sending half of a `watch` channel. The running job
//! holds the receiving half in a [`JobControl`] and observes pause, resume
//! and end through it. Removing an entry drops the sender, which the job
//! observes as `Ended`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::metrics::ACTIVE_JOBS;

use super::types::{JobError, JobKey, JobStatus};

struct JobEntry {
    id: u64,
    status: watch::Sender<JobStatus>,
}

/// Identity of one registration. Lets the owner release its entry even
/// after the [`JobControl`] is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    id: u64,
    key: JobKey,
}

impl JobLease {
    pub fn key(&self) -> &JobKey {
        &self.key
    }
}

/// Receiving side of a job's control channel, held by the running job.
pub struct JobControl {
    id: u64,
    key: JobKey,
    rx: watch::Receiver<JobStatus>,
}

impl JobControl {
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    pub fn lease(&self) -> JobLease {
        JobLease {
            id: self.id,
            key: self.key.clone(),
        }
    }

    /// Current status. A removed entry reads as `Ended`.
    pub fn status(&self) -> JobStatus {
        if self.rx.has_changed().is_err() {
            return JobStatus::Ended;
        }
        *self.rx.borrow()
    }

    pub fn is_ended(&self) -> bool {
        self.status() == JobStatus::Ended
    }

    /// Wait until the job is no longer paused.
    pub async fn wait_while_paused(&mut self) -> JobStatus {
        match self.rx.wait_for(|s| *s != JobStatus::Paused).await {
            Ok(status) => *status,
            Err(_) => JobStatus::Ended,
        }
    }

    /// Resolve once the job is ended or removed.
    pub async fn ended(&mut self) {
        let _ = self.rx.wait_for(|s| *s == JobStatus::Ended).await;
    }
}

/// Concurrent map from job key to control status.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobKey, JobEntry>>,
    next_id: AtomicU64,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a job as `Running`.
    ///
    /// Fails if a live job already holds the key.
    pub async fn create(&self, key: JobKey) -> Result<JobControl, JobError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&key) {
            return Err(JobError::AlreadyRunning(key.profile_name));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(JobStatus::Running);
        jobs.insert(key.clone(), JobEntry { id, status: tx });
        ACTIVE_JOBS.inc();
        debug!(job = %key, "Registered job");

        Ok(JobControl { id, key, rx })
    }

    /// Update a job's status. Returns false if no such job exists.
    ///
    /// `Ended` is terminal; later updates are ignored.
    pub async fn set_status(&self, key: &JobKey, status: JobStatus) -> bool {
        let jobs = self.jobs.read().await;
        let Some(entry) = jobs.get(key) else {
            return false;
        };

        let changed = entry.status.send_if_modified(|current| {
            if *current == JobStatus::Ended || *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!(job = %key, ?status, "Job status changed");
        }
        true
    }

    pub async fn status(&self, key: &JobKey) -> Option<JobStatus> {
        self.jobs
            .read()
            .await
            .get(key)
            .map(|entry| *entry.status.borrow())
    }

    pub async fn exists(&self, key: &JobKey) -> bool {
        self.jobs.read().await.contains_key(key)
    }

    /// Remove a job. Its runner observes the removal as `Ended`.
    pub async fn delete(&self, key: &JobKey) -> bool {
        let removed = self.jobs.write().await.remove(key).is_some();
        if removed {
            ACTIVE_JOBS.dec();
        }
        removed
    }

    /// Remove the entry registered under `lease`, unless the key was
    /// already taken over by a newer job.
    pub async fn release(&self, lease: &JobLease) -> bool {
        let mut jobs = self.jobs.write().await;
        let owned = jobs
            .get(&lease.key)
            .is_some_and(|entry| entry.id == lease.id);
        if owned {
            jobs.remove(&lease.key);
            ACTIVE_JOBS.dec();
        }
        owned
    }

    /// Remove every job of a session. Returns how many were removed.
    pub async fn delete_all_for_session(&self, session_id: &str) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|key, _| key.session_id != session_id);
        let removed = before - jobs.len();
        if removed > 0 {
            ACTIVE_JOBS.sub(removed as i64);
            debug!(session_id, removed, "Removed session jobs");
        }
        removed
    }

    /// Profiles and statuses of a session's jobs, sorted by profile.
    pub async fn list_for_session(&self, session_id: &str) -> Vec<(String, JobStatus)> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<_> = jobs
            .iter()
            .filter(|(key, _)| key.session_id == session_id)
            .map(|(key, entry)| (key.profile_name.clone(), *entry.status.borrow()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
