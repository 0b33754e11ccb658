//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns
//! a ready-to-serve [`axum::Router`]. Sessions ride a `tower-sessions`
//! in-memory store; the auth gate is applied as a route layer on the
//! two mutating routes only, so browsing stays public.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_sessions::{cookie::SameSite, MemoryStore, SessionManagerLayer};
use utoipa::OpenApi;

use crate::errors::generate_request_id;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the BookSwap HTTP API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "BookSwap API",
        version = "0.1.0",
        description = "Book-swapping backend: browse, share, and remove books"
    ),
    paths(
        // Health check
        health_check,
        // Book operations
        crate::handlers::books::index,
        crate::handlers::books::list_books,
        crate::handlers::books::upload_book,
        crate::handlers::books::delete_book,
        // Auth flow
        crate::handlers::auth::login,
        crate::handlers::auth::authorize,
        crate::handlers::auth::logout,
    ),
    components(schemas(crate::db::Book)),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Books", description = "Book listing and sharing"),
        (name = "Auth", description = "Hosted-provider sign-in and sign-out"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all application routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.server.max_upload_bytes;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax);

    // Mutating routes sit behind the auth gate; browsing stays public.
    let gated = Router::new()
        .route("/upload", post(crate::handlers::books::upload_book))
        .route("/books/:id", delete(crate::handlers::books::delete_book))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::handlers::auth::require_user_middleware,
        ));

    Router::new()
        // Health check endpoint.
        .route("/health", get(health_check))
        // Prometheus metrics endpoint.
        .route("/metrics", get(metrics_handler))
        // OpenAPI document.
        .route("/openapi.json", get(openapi_spec))
        // Browser-facing index and the JSON book list.
        .route("/", get(crate::handlers::books::index))
        .route("/books", get(crate::handlers::books::list_books))
        // OAuth2 flow.
        .route("/login", get(crate::handlers::auth::login))
        .route("/authorize", get(crate::handlers::auth::authorize))
        .route("/logout", get(crate::handlers::auth::logout))
        .merge(gated)
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        // The session layer sits closest to the routes so the auth gate
        // and the handlers can both read it.
        .layer(session_layer)
        // common_headers_middleware adds standard response headers.
        .layer(middleware::from_fn(common_headers_middleware))
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
        // Cap request bodies at the configured upload limit.
        .layer(DefaultBodyLimit::max(body_limit))
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `BookSwap`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Only set x-request-id if not already present (the error renderer
    // sets its own).
    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    // Always overwrite Date and Server to ensure consistency
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("BookSwap"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /openapi.json` -- machine-readable API description.
async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------
