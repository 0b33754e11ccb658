//! Sign-in, OAuth2 callback, and sign-out handlers.
//!
//! The flow is the standard authorization-code dance against a hosted
//! identity provider: `/login` stashes a random `state` in the session
//! and redirects to the provider's sign-in page, `/authorize` is the
//! registered callback that verifies `state`, exchanges the code, and
//! stores the user's claims, and `/logout` drops the session user and
//! hands the browser to the provider's logout endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::debug;

use crate::errors::{ApiError, AuthError};
use crate::oidc::{generate_state, UserClaims};
use crate::AppState;

// -- Session keys --------------------------------------------------------------

/// Session key holding the pending OAuth2 `state` value.
pub const SESSION_STATE_KEY: &str = "oauth_state";

/// Session key holding the signed-in user's claims.
pub const SESSION_USER_KEY: &str = "user";

/// Read the signed-in user's claims from the session, if any.
pub async fn current_user(session: &Session) -> Result<Option<UserClaims>, ApiError> {
    Ok(session.get::<UserClaims>(SESSION_USER_KEY).await?)
}

// -- Auth gate -----------------------------------------------------------------

/// Session-based auth gate for mutating routes.
///
/// Applied as a `route_layer`, so it runs only on the routes that carry
/// it. With `AUTH_REQUIRED` off the gate waves everything through and
/// handlers record the anonymous user id instead.
pub async fn require_user_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.settings.auth.required && current_user(&session).await?.is_none() {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

// -- Handlers ------------------------------------------------------------------

/// `GET /login` -- Start the authorization-code flow.
///
/// Issues a fresh `state`, stores it in the session, and redirects the
/// browser to the provider's hosted sign-in page.
#[utoipa::path(
    get,
    path = "/login",
    tag = "Auth",
    operation_id = "Login",
    responses(
        (status = 303, description = "Redirect to the provider sign-in page"),
        (status = 500, description = "Provider discovery failed")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let oauth_state = generate_state();
    session.insert(SESSION_STATE_KEY, &oauth_state).await?;

    let url = state.oidc.authorize_url(&oauth_state).await?;
    debug!("login: redirecting to hosted sign-in");
    Ok(Redirect::to(&url).into_response())
}

/// Callback query parameters sent back by the provider.
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /authorize` -- OAuth2 callback.
///
/// Verifies the `state` round-trip, exchanges the code for tokens,
/// resolves the user's claims, and establishes the session.
#[utoipa::path(
    get,
    path = "/authorize",
    tag = "Auth",
    operation_id = "Authorize",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Anti-forgery state value")
    ),
    responses(
        (status = 303, description = "Signed in; redirect to the index"),
        (status = 400, description = "Missing code or state mismatch"),
        (status = 500, description = "Code exchange or userinfo request failed")
    )
)]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, ApiError> {
    // The pending state is single-use: take it out of the session before
    // comparing so a replayed callback cannot match twice.
    let pending: Option<String> = session.remove(SESSION_STATE_KEY).await?;
    match (&pending, &query.state) {
        (Some(expected), Some(returned)) if expected == returned => {}
        _ => return Err(AuthError::InvalidState.into()),
    }

    let code = query.code.as_deref().ok_or_else(|| ApiError::MissingField {
        field: "code".to_string(),
    })?;

    let claims = state.oidc.authenticate(code).await?;
    let who = claims
        .email
        .clone()
        .unwrap_or_else(|| claims.sub.clone());
    session.insert(SESSION_USER_KEY, &claims).await?;

    state.logger.info(&format!("user {who} signed in")).await;
    Ok(Redirect::to("/").into_response())
}

/// `GET /logout` -- Drop the session user and sign out at the provider.
///
/// The provider redirects back to the service base URL afterwards, so
/// the browser lands on the anonymous index.
#[utoipa::path(
    get,
    path = "/logout",
    tag = "Auth",
    operation_id = "Logout",
    responses(
        (status = 303, description = "Redirect to the provider logout endpoint")
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let user: Option<UserClaims> = session.remove(SESSION_USER_KEY).await?;
    if let Some(claims) = user {
        let who = claims.email.as_deref().unwrap_or(&claims.sub);
        state.logger.info(&format!("user {who} signed out")).await;
    }
    Ok(Redirect::to(&state.oidc.logout_url()).into_response())
}
