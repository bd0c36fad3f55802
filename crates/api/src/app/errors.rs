use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cad_auth::{AuthError, GatewayError, Rejection};
use cad_core::DomainError;

/// `{ "error": "<reason>" }` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

pub fn internal_error() -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub fn rejection_status(rejection: &Rejection) -> StatusCode {
    if rejection.is_forbidden() {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::UNAUTHORIZED
    }
}

/// Rejections become 401/403; anything else is an outage, not an auth decision.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::Rejected(rejection) => {
            tracing::debug!(?rejection, "request rejected by authorization chain");
            json_error(rejection_status(&rejection), rejection.to_string())
        }
        other => {
            tracing::error!(error = %other, "authorization chain failed");
            internal_error()
        }
    }
}

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    match err {
        GatewayError::EmailTaken => json_error(StatusCode::CONFLICT, "Email already registered"),
        GatewayError::NotFound => json_error(StatusCode::NOT_FOUND, "Account not found"),
        GatewayError::Unavailable(msg) => {
            tracing::error!(error = %msg, "account store unavailable");
            internal_error()
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Unchanged(_) => json_error(StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, msg)
        }
    }
}
