//! Prometheus metrics.
//!
//! A process-global recorder is installed once through
//! `metrics-exporter-prometheus`; request counts and latencies come from
//! a middleware wrapping the whole router, and domain counters are
//! bumped by the handlers. `/metrics` renders the exposition text.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "bookswap_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "bookswap_http_request_duration_seconds";

/// Books successfully uploaded (counter).
pub const BOOKS_UPLOADED_TOTAL: &str = "bookswap_books_uploaded_total";

/// Book rows removed by delete requests (counter).
pub const BOOKS_DELETED_TOTAL: &str = "bookswap_books_deleted_total";

/// Cover bytes accepted for upload (counter).
pub const COVER_UPLOAD_BYTES_TOTAL: &str = "bookswap_cover_upload_bytes_total";

/// Book rows currently stored (gauge). Seeded from the database at
/// startup, adjusted by the upload and delete handlers.
pub const BOOKS_TOTAL: &str = "bookswap_books_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder, once. Safe to call again
/// (tests share one process); later calls return the existing handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions. Call once after `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(BOOKS_UPLOADED_TOTAL, "Books successfully uploaded");
    describe_counter!(BOOKS_DELETED_TOTAL, "Book rows removed by delete requests");
    describe_counter!(COVER_UPLOAD_BYTES_TOTAL, "Cover bytes accepted for upload");
    describe_gauge!(BOOKS_TOTAL, "Book rows currently stored");
}

// -- Request middleware ---------------------------------------------------------

/// Record count and latency for every request passing through.
///
/// Applied as the outermost layer so the timings cover the full stack.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    // The exposition endpoint stays out of its own numbers.
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let route = route_label(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();
    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "path" => route.clone()
    )
    .record(elapsed);
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "path" => route,
        "status" => status
    )
    .increment(1);

    response
}

/// Collapse a concrete request path into a bounded route label.
///
/// Book ids would otherwise mint one label per row (`/books/1`,
/// `/books/2`, ...); anything unrouted lands in a single bucket.
fn route_label(path: &str) -> String {
    const FIXED: &[&str] = &[
        "/",
        "/books",
        "/upload",
        "/login",
        "/authorize",
        "/logout",
        "/health",
        "/metrics",
        "/openapi.json",
    ];
    if FIXED.contains(&path) {
        path.to_string()
    } else if path.starts_with("/books/") {
        "/books/{id}".to_string()
    } else {
        "/unknown".to_string()
    }
}

// -- Exposition endpoint --------------------------------------------------------

/// `GET /metrics` -- Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = PROMETHEUS_HANDLE.get().expect("recorder installed at startup");
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        handle.render(),
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label_fixed_routes() {
        for path in ["/", "/books", "/upload", "/logout", "/openapi.json"] {
            assert_eq!(route_label(path), path);
        }
    }

    #[test]
    fn test_route_label_collapses_book_ids() {
        assert_eq!(route_label("/books/1"), "/books/{id}");
        assert_eq!(route_label("/books/99999"), "/books/{id}");
        assert_eq!(route_label("/books/not-a-number"), "/books/{id}");
    }

    #[test]
    fn test_route_label_unknown_is_bounded() {
        assert_eq!(route_label("/favicon.ico"), "/unknown");
        assert_eq!(route_label("/a/b/c"), "/unknown");
        assert_eq!(route_label("/bookshelf"), "/unknown");
    }
}
