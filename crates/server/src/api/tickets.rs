//! Ticket log handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::failures::{profile_not_found, FailureErrorResponse};
use crate::state::AppState;

const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct TicketListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedTicket {
    pub ticket_number: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct TicketsResponse {
    pub profile: String,
    pub tickets: Vec<LoggedTicket>,
}

/// GET /api/v1/profiles/{name}/tickets
///
/// Tickets created through this service for the profile, newest first.
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<TicketListParams>,
) -> Result<Json<TicketsResponse>, impl IntoResponse> {
    if state.profiles().get(&name).is_none() {
        return Err(profile_not_found(&name));
    }

    let limit = params.limit.clamp(0, MAX_LIMIT);
    let records = match state.ticket_log().list_for_profile(&name, limit) {
        Ok(records) => records,
        Err(e) => {
            warn!(profile = %name, error = %e, "Ticket log listing failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FailureErrorResponse {
                    error: e.to_string(),
                    full_response: None,
                }),
            ));
        }
    };

    let tickets = records
        .into_iter()
        .map(|record| LoggedTicket {
            ticket_number: record.ticket_number,
            email: record.email,
            created_at: record.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(TicketsResponse {
        profile: name,
        tickets,
    }))
}
