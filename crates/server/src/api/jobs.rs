//! Job inspection handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use deskrelay_core::JobStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub profile: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJobsResponse {
    pub session_id: String,
    pub jobs: Vec<JobSummary>,
}

/// GET /api/v1/jobs/{session_id}
///
/// Live jobs of a session. Finished jobs are not listed.
pub async fn list_session_jobs(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<SessionJobsResponse> {
    let jobs = state
        .registry()
        .list_for_session(&session_id)
        .await
        .into_iter()
        .map(|(profile, status)| JobSummary { profile, status })
        .collect();

    Json(SessionJobsResponse { session_id, jobs })
}
