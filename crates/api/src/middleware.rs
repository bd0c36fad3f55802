use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use cad_auth::{AccessPolicy, AuthorizationChain, EncodeResult};

use crate::app::errors;

/// Set on responses to requests whose token was refreshed inside its grace window.
pub const REFRESH_HEADER: HeaderName = HeaderName::from_static("x-authorization-refresh");

/// Per-route middleware state: the shared chain plus what this route demands.
#[derive(Clone)]
pub struct AuthState {
    pub chain: Arc<AuthorizationChain>,
    pub policy: Arc<AccessPolicy>,
}

impl AuthState {
    pub fn new(chain: Arc<AuthorizationChain>, policy: AccessPolicy) -> Self {
        Self {
            chain,
            policy: Arc::new(policy),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authorization = authorization_header(req.headers());

    let authorized = match state
        .chain
        .authorize(authorization.as_deref(), &state.policy, Utc::now())
        .await
    {
        Ok(authorized) => authorized,
        Err(denied) => {
            // A grace refresh is handed out even when a later stage rejects.
            let mut response = errors::auth_error_to_response(denied.error);
            attach_refresh(&mut response, denied.refreshed.as_ref());
            return response;
        }
    };

    req.extensions_mut().insert(authorized.context);

    let mut response = next.run(req).await;
    attach_refresh(&mut response, authorized.refreshed.as_ref());
    response
}

fn attach_refresh(response: &mut Response, refreshed: Option<&EncodeResult>) {
    let Some(refreshed) = refreshed else {
        return;
    };

    match HeaderValue::from_str(&refreshed.token) {
        Ok(value) => {
            response.headers_mut().insert(REFRESH_HEADER, value);
        }
        Err(e) => tracing::error!(error = %e, "refreshed token is not a valid header value"),
    }
}

/// Owned copy of the `Authorization` header.
///
/// A value that is not visible ASCII is passed on as empty, which the chain
/// rejects as a malformed scheme.
fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string())
}
