//! Router configuration for the Turnstile HTTP surface.
//!
//! Builds the complete Axum router with all endpoints.

use crate::handlers::health::health_check;
use crate::handlers::{tickets, verify};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Routes:
/// - `/health`: liveness (no authentication)
/// - `/verify`: scan-payload entry points
/// - `/api/tickets...`: ticket management
///
/// # Arguments
///
/// - `state`: Application state to share with handlers
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tickets", post(tickets::issue_ticket))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:token", get(tickets::inspect_ticket))
        .route("/tickets/:token", delete(tickets::delete_ticket))
        .route("/tickets/:token/redeem", post(tickets::redeem_ticket))
        .route("/tickets/:token/image", get(tickets::ticket_image));

    Router::new()
        .route("/health", get(health_check))
        // The URL form of the scan payload resolves here.
        .route("/verify", get(verify::verify_scan))
        .route("/verify", post(verify::redeem_scan))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
