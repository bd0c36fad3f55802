//! Account registration, login and administration.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
};

use cad_auth::{
    AccessPolicy, AccountPatch, AuthorizationChain, AuthorizationContext, FlagsPatch,
    PartialSession,
};
use cad_core::AccountId;

use crate::app::dto::{AccountView, CreatedAccount, CredentialsRequest, ResultMessage};
use crate::app::errors;
use crate::middleware::{AuthState, auth_middleware};

// -------------------------
// Router
// -------------------------

pub fn router(chain: &Arc<AuthorizationChain>) -> Router {
    let signed_in = AuthState::new(chain.clone(), AccessPolicy::authenticated());
    let admin = AuthState::new(chain.clone(), AccessPolicy::authenticated().verified().admin());

    Router::new()
        .route(
            "/",
            get(list_accounts)
                .route_layer(from_fn_with_state(admin.clone(), auth_middleware))
                .post(create_account),
        )
        .route("/login", post(login))
        .route(
            "/@me",
            get(me)
                .patch(update_me)
                .route_layer(from_fn_with_state(signed_in, auth_middleware)),
        )
        .route(
            "/:account_id",
            get(get_account).route_layer(from_fn_with_state(admin.clone(), auth_middleware)),
        )
        .route(
            "/:account_id/flags",
            patch(update_flags).route_layer(from_fn_with_state(admin, auth_middleware)),
        )
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| errors::json_error(rejection.status(), rejection.body_text()))
}

fn parse_account_id(raw: &str) -> Result<AccountId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::NOT_FOUND, "Account not found"))
}

// -------------------------
// Handlers
// -------------------------

/// POST /accounts - Register an account (all capability flags cleared)
pub async fn create_account(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match parse_body(payload) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    if body.email.trim().is_empty() || body.password.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "email and password are required");
    }

    match chain.accounts().create(body.email.trim(), &body.password).await {
        Ok(account) => {
            tracing::info!(account_id = %account.id, "account created");
            (StatusCode::CREATED, Json(CreatedAccount { id: account.id })).into_response()
        }
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// POST /accounts/login - Exchange credentials for a session token
pub async fn login(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match parse_body(payload) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let account = match chain
        .accounts()
        .find_by_credentials(body.email.trim(), &body.password)
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "Invalid email or password");
        }
        Err(e) => return errors::gateway_error_to_response(e),
    };

    match chain.codec().encode(PartialSession::new(account.id)) {
        Ok(minted) => {
            tracing::info!(account_id = %account.id, expires = %minted.expires, "session issued");
            (StatusCode::CREATED, Json(minted)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to mint session token");
            errors::internal_error()
        }
    }
}

/// GET /accounts/@me - The authenticated account
pub async fn me(Extension(ctx): Extension<AuthorizationContext>) -> axum::response::Response {
    Json(AccountView::from(ctx.account)).into_response()
}

/// PATCH /accounts/@me - Change the caller's email and/or password
pub async fn update_me(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    Extension(ctx): Extension<AuthorizationContext>,
    payload: Result<Json<AccountPatch>, JsonRejection>,
) -> axum::response::Response {
    let patch = match parse_body(payload) {
        Ok(patch) => patch,
        Err(resp) => return resp,
    };

    if patch.is_empty() {
        return Json(ResultMessage::new("No changes saved")).into_response();
    }

    let password_is_current = match &patch.password {
        Some(password) => match chain.accounts().verify_password(&ctx.account.id, password).await {
            Ok(matches) => matches,
            Err(e) => return errors::gateway_error_to_response(e),
        },
        None => false,
    };

    let account = match patch.apply(&ctx.account, password_is_current) {
        Ok(account) => account,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = chain.accounts().save(&account).await {
        return errors::gateway_error_to_response(e);
    }

    if let Some(password) = &patch.password {
        if let Err(e) = chain.accounts().set_password(&account.id, password).await {
            return errors::gateway_error_to_response(e);
        }
    }

    tracing::info!(
        account_id = %account.id,
        email_changed = patch.email.is_some(),
        password_changed = patch.password.is_some(),
        "account updated"
    );

    Json(ResultMessage::new(format!("{} change(s) saved", patch.change_count()))).into_response()
}

/// GET /accounts - Every account [verified admin]
pub async fn list_accounts(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
) -> axum::response::Response {
    match chain.accounts().list().await {
        Ok(accounts) => {
            let views: Vec<AccountView> = accounts.into_iter().map(AccountView::from).collect();
            Json(views).into_response()
        }
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// GET /accounts/:account_id - One account [verified admin]
pub async fn get_account(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    Path(account_id): Path<String>,
) -> axum::response::Response {
    let id = match parse_account_id(&account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match chain.accounts().find_by_id(&id).await {
        Ok(Some(account)) => Json(AccountView::from(account)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "Account not found"),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

/// PATCH /accounts/:account_id/flags - Change verified/leo/ems [verified admin]
pub async fn update_flags(
    Extension(chain): Extension<Arc<AuthorizationChain>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(account_id): Path<String>,
    payload: Result<Json<FlagsPatch>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_account_id(&account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut account = match chain.accounts().find_by_id(&id).await {
        Ok(Some(account)) => account,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "Account not found"),
        Err(e) => return errors::gateway_error_to_response(e),
    };

    let patch = match parse_body(payload) {
        Ok(patch) => patch,
        Err(resp) => return resp,
    };

    if patch.is_empty() {
        return Json(ResultMessage::new("No flags saved")).into_response();
    }

    account.flags = match patch.apply(account.flags) {
        Ok(flags) => flags,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = chain.accounts().save(&account).await {
        return errors::gateway_error_to_response(e);
    }

    tracing::info!(
        account_id = %account.id,
        changed_by = %ctx.account.id,
        flags = ?account.flags,
        "account flags updated"
    );

    Json(ResultMessage::new("Flags saved")).into_response()
}
