//! HTTP endpoints
//!
//! One endpoint carries all four operations, selected by method. A sibling
//! `/health` route reports store connectivity.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::database::traits::DatabaseError;
use crate::gateway::TableGateway;
use crate::Error;

pub mod health;
pub mod records;

pub use health::health_handler;
pub use records::{
    delete_handler, insert_handler, method_not_allowed, select_handler, update_handler,
};

/// Shared handler state
pub struct GatewayState<G> {
    pub gateway: Arc<G>,

    /// Table used when a request names none
    pub default_table: Arc<str>,
}

// Derived Clone would require `G: Clone`
impl<G> Clone for GatewayState<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            default_table: self.default_table.clone(),
        }
    }
}

/// Create the API router with all endpoints
///
/// # Arguments
///
/// * `base_path` - Path of the CRUD endpoint (e.g. "/api/db")
/// * `state` - Gateway and default table shared by every handler
pub fn create_api_router<G: TableGateway>(base_path: &str, state: GatewayState<G>) -> Router {
    let base_path = base_path.trim_end_matches('/');
    let endpoint = if base_path.is_empty() { "/" } else { base_path };

    Router::new()
        .route(
            endpoint,
            get(select_handler::<G>)
                .post(insert_handler::<G>)
                .patch(update_handler::<G>)
                .delete(delete_handler::<G>)
                .fallback(method_not_allowed),
        )
        .route(&format!("{base_path}/health"), get(health_handler::<G>))
        .with_state(state)
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidIdentifier(_)
            | Error::NoValidColumns
            | Error::MissingData(_)
            | Error::MissingFilter(_)
            | Error::InvalidLimit(_)
            | Error::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::Database(DatabaseError::Remote { .. } | DatabaseError::Transport(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": msg, "message": msg}` with the given status
pub(crate) fn error_envelope(status: StatusCode, error: &Error) -> Response {
    let message = error.to_string();
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "message": message,
        })),
    )
        .into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "store operation failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        error_envelope(status, &self)
    }
}
