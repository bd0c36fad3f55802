use std::sync::Arc;

use axum::Router;

use cad_auth::AuthorizationChain;

pub mod accounts;
pub mod dispatch;
pub mod system;

/// Router for everything under `/accounts` and `/dispatch`.
///
/// Each route carries its own guard (see `crate::middleware`), so public and
/// protected handlers can share a path.
pub fn router(chain: &Arc<AuthorizationChain>) -> Router {
    Router::new()
        .nest("/accounts", accounts::router(chain))
        .nest("/dispatch", dispatch::router(chain))
}
