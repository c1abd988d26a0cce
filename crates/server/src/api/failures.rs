//! Email failure alert handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use deskrelay_core::desk::ErrorInfo;
use tracing::warn;

use crate::state::AppState;

/// A failure alert with the recipient resolved from the ticket log.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    /// Recipient, when the ticket was created through this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub reason: String,
    pub raw: Value,
}

#[derive(Debug, Serialize)]
pub struct FailuresResponse {
    pub profile: String,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_response: Option<Value>,
}

pub(crate) fn profile_not_found(name: &str) -> (StatusCode, Json<FailureErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(FailureErrorResponse {
            error: format!("Profile not found: {}", name),
            full_response: None,
        }),
    )
}

fn upstream_error(info: ErrorInfo) -> (StatusCode, Json<FailureErrorResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(FailureErrorResponse {
            error: info.message,
            full_response: Some(info.full_response),
        }),
    )
}

/// GET /api/v1/profiles/{name}/failures
///
/// Failure alerts of the profile's department, mapped back to recipients.
pub async fn list_failures(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FailuresResponse>, impl IntoResponse> {
    let Some(profile) = state.profiles().get(&name) else {
        return Err(profile_not_found(&name));
    };

    let alerts = match state.desk().failure_alerts(&profile).await {
        Ok(alerts) => alerts,
        Err(e) => {
            warn!(
                profile = %name,
                status = ?e.status(),
                error = %e,
                "Failure alert lookup failed"
            );
            return Err(upstream_error(ErrorInfo::from(&e)));
        }
    };

    let failures = alerts
        .into_iter()
        .map(|alert| {
            let email = alert.ticket_number.as_deref().and_then(|number| {
                match state.ticket_log().find(&name, number) {
                    Ok(record) => record.map(|r| r.email),
                    Err(e) => {
                        warn!(ticket = number, error = %e, "Ticket log lookup failed");
                        None
                    }
                }
            });
            FailureEntry {
                ticket_number: alert.ticket_number,
                email,
                reason: alert.reason,
                raw: alert.raw,
            }
        })
        .collect();

    Ok(Json(FailuresResponse {
        profile: name,
        failures,
    }))
}

/// DELETE /api/v1/profiles/{name}/failures
///
/// Clear the failure alerts of the profile's department.
pub async fn clear_failures(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, impl IntoResponse> {
    let Some(profile) = state.profiles().get(&name) else {
        return Err(profile_not_found(&name));
    };

    match state.desk().clear_failure_alerts(&profile).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            warn!(profile = %name, error = %e, "Clearing failure alerts failed");
            Err(upstream_error(ErrorInfo::from(&e)))
        }
    }
}
