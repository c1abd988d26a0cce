use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use deskrelay_core::config::SanitizedProfile;
use deskrelay_core::SanitizedConfig;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Configured profiles, without credentials.
pub async fn list_profiles(State(state): State<Arc<AppState>>) -> Json<Vec<SanitizedProfile>> {
    let profiles = state.profiles();
    Json(
        profiles
            .names()
            .iter()
            .filter_map(|name| profiles.get(name))
            .map(|profile| SanitizedProfile::from(profile.as_ref()))
            .collect(),
    )
}

/// Prometheus text exposition.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
