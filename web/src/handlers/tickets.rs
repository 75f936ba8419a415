//! Ticket management API endpoints.
//!
//! - `POST /api/tickets`: issue a ticket (requires auth)
//! - `GET /api/tickets?event_ref=...`: list tickets for an event
//! - `GET /api/tickets/:token`: inspect a ticket (read-only preview)
//! - `POST /api/tickets/:token/redeem`: redeem exactly once (requires auth)
//! - `DELETE /api/tickets/:token`: administrative revocation (requires auth)
//! - `GET /api/tickets/:token/image`: composed scan image
//!
//! Redemption outcomes (`accepted`, `already_used`, `unknown`) are normal
//! response values, each rendered distinctly; none of them is an HTTP
//! error. Store failures are the only errors on that path.

use crate::auth::AuthenticatedScanner;
use crate::compose::ImageCaption;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use turnstile_core::redemption::RedeemOutcome;
use turnstile_core::ticket::{EventRef, Ticket};
use turnstile_core::token::Token;
use turnstile_core::verify::InspectOutcome;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to issue a new ticket.
#[derive(Debug, Deserialize)]
pub struct IssueTicketRequest {
    /// Event the ticket admits to.
    pub event_ref: String,
    /// Holder display name (opaque, not validated).
    pub holder_name: String,
    /// Holder phone number (opaque, not validated).
    pub holder_phone: String,
}

/// Response after issuing a ticket.
#[derive(Debug, Serialize)]
pub struct IssueTicketResponse {
    /// The persisted ticket record.
    pub ticket: Ticket,
    /// Payload to embed in the scannable image.
    pub scan_payload: String,
}

/// Query parameters for listing tickets.
#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    /// Event to list tickets for.
    pub event_ref: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a new ticket.
///
/// Mints a fresh token, persists the record, and returns it together with
/// the scan payload for the image collaborator. A store failure surfaces as
/// a retryable 503; a failed issuance is never reported as success.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/tickets \
///   -H "Authorization: Bearer <scanner_credential>" \
///   -H "Content-Type: application/json" \
///   -d '{"event_ref": "E1", "holder_name": "Ana", "holder_phone": "555-0100"}'
/// ```
pub async fn issue_ticket(
    _scanner: AuthenticatedScanner,
    State(state): State<AppState>,
    Json(request): Json<IssueTicketRequest>,
) -> Result<(StatusCode, Json<IssueTicketResponse>), AppError> {
    if request.event_ref.trim().is_empty() {
        return Err(AppError::bad_request("event_ref must not be empty"));
    }

    let issued = state
        .issuance
        .issue(
            EventRef::new(request.event_ref),
            request.holder_name,
            request.holder_phone,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueTicketResponse {
            ticket: issued.ticket,
            scan_payload: issued.scan_payload,
        }),
    ))
}

/// List tickets for an event, newest first.
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let mut tickets = state
        .store
        .list_by_event(&EventRef::new(query.event_ref))
        .await?;
    // Store order is unspecified; display order is issued_at descending.
    tickets.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
    Ok(Json(tickets))
}

/// Inspect a ticket without changing it ("preview before redeeming").
///
/// An unknown token is a normal `{"status": "unknown"}` body, not a 404:
/// door scanners treat it as one of the three expected answers.
pub async fn inspect_ticket(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InspectOutcome>, AppError> {
    let outcome = state.verification.inspect(&Token::new(token)).await?;
    Ok(Json(outcome))
}

/// Redeem a ticket exactly once.
///
/// The authenticated principal becomes `redeemed_by`. Among concurrent
/// calls on the same token exactly one response is `accepted`; the rest are
/// `already_used` carrying the winner's stamps.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/tickets/<token>/redeem \
///   -H "Authorization: Bearer <scanner_credential>"
/// ```
pub async fn redeem_ticket(
    scanner: AuthenticatedScanner,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<RedeemOutcome>, AppError> {
    let outcome = state
        .verification
        .redeem(&Token::new(token), &scanner.0.id)
        .await?;
    Ok(Json(outcome))
}

/// Revoke (delete) a ticket.
///
/// Idempotent and safe in either lifecycle state; deleting an absent token
/// still returns 204.
pub async fn delete_ticket(
    _scanner: AuthenticatedScanner,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete(&Token::new(token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the composed scan image for a ticket.
///
/// Delegates rendering to the configured image collaborator; the handler
/// supplies only the scan payload and display caption. Returns 503 when no
/// composer is deployed.
pub async fn ticket_image(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let composer = state
        .composer
        .as_ref()
        .ok_or_else(|| AppError::unavailable("no image composer configured"))?;

    let token = Token::new(token);
    let ticket = state
        .store
        .get(&token)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", &token))?;

    let payload = state.issuance.payload_for(&ticket.token);
    let caption = ImageCaption {
        event_ref: ticket.event_ref.to_string(),
        holder_name: ticket.holder_name.clone(),
    };
    let image = composer
        .compose(&payload, &caption)
        .map_err(|e| AppError::internal("image composition failed").with_source(e.into()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, image.content_type)],
        image.bytes,
    )
        .into_response())
}
