//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: account store wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent `{ "error": ... }` responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use cad_auth::{AccountGateway, AuthorizationChain, TokenCodec};

use crate::config::AppConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &AppConfig, accounts: Arc<dyn AccountGateway>) -> Router {
    let codec = TokenCodec::new(config.jwt_secret.as_bytes());
    let chain = Arc::new(AuthorizationChain::new(codec, accounts).with_leo_policy(config.leo_policy));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&chain))
        .layer(ServiceBuilder::new().layer(Extension(chain)))
}
