//! Connectivity check

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use super::{error_envelope, GatewayState};
use crate::gateway::TableGateway;
use crate::schema::HealthResponse;

/// Handler for GET {base}/health
///
/// `200 {"status":"ok"}` when the store answers, `503` with the error
/// envelope otherwise.
pub async fn health_handler<G: TableGateway>(State(state): State<GatewayState<G>>) -> Response {
    match state.gateway.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
        })
        .into_response(),
        Err(error) => {
            tracing::error!(%error, "health check failed");
            error_envelope(StatusCode::SERVICE_UNAVAILABLE, &error)
        }
    }
}
