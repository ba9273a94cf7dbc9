use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use lexdesk_arbitration::ApplicationError;
use lexdesk_history::HistoryError;
use lexdesk_infra::IdentityError;

/// Body shared by the authentication and authorization gates.
pub fn gate_error(status: StatusCode, message: &str, path: &str) -> Response {
    (
        status,
        axum::Json(json!({
            "message": message,
            "timestamp": Utc::now().timestamp(),
            "path": path,
        })),
    )
        .into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn application_error_to_response(err: ApplicationError) -> Response {
    match err {
        ApplicationError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "application not found"),
        ApplicationError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ApplicationError::UnknownStatus(status) => json_error(
            StatusCode::BAD_REQUEST,
            "unknown_status",
            format!("unknown status: {status}"),
        ),
        ApplicationError::Timeline(e) => history_error_to_response(e),
    }
}

pub fn identity_error_to_response(err: IdentityError) -> Response {
    match err {
        IdentityError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        IdentityError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        IdentityError::MenuCycle => json_error(StatusCode::UNPROCESSABLE_ENTITY, "menu_cycle", err.to_string()),
        IdentityError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        IdentityError::Persistence(msg) => {
            tracing::error!(error = %msg, "identity store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "identity store unavailable")
        }
    }
}

pub fn history_error_to_response(err: HistoryError) -> Response {
    tracing::error!(error = %err, "history store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "history store unavailable")
}

/// Parse a path segment into a typed id, answering 400 on failure.
pub fn parse_id<T: FromStr>(raw: &str) -> Result<T, Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid id: {raw}")))
}
