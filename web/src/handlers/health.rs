//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the service is
//! running.

use axum::http::StatusCode;

/// Simple liveness check.
///
/// Returns 200 OK to indicate the process is up. Does NOT check the ticket
/// store; a scanner backend with a flapping database should still accept
/// traffic so callers see `SERVICE_UNAVAILABLE` errors instead of timeouts.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
