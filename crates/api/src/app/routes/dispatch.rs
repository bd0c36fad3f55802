//! Law-enforcement area. Guarded by the LEO gate.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use cad_auth::{AccessPolicy, AuthorizationChain, AuthorizationContext};

use crate::middleware::{AuthState, auth_middleware};

pub fn router(chain: &Arc<AuthorizationChain>) -> Router {
    let leo = AuthState::new(chain.clone(), AccessPolicy::authenticated().verified().leo());

    Router::new().route(
        "/whoami",
        get(whoami).route_layer(from_fn_with_state(leo, auth_middleware)),
    )
}

/// GET /dispatch/whoami - Session and capabilities as the LEO gate saw them
pub async fn whoami(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    Extension(ctx): Extension<AuthorizationContext>,
) -> impl IntoResponse {
    Json(json!({
        "account_id": ctx.account.id.to_string(),
        "flags": ctx.account.flags,
        "session": {
            "issued": ctx.session.issued.timestamp_millis(),
            "expires": ctx.session.expires.timestamp_millis(),
        },
        "leo_policy": chain.leo_policy().as_str(),
    }))
}
