//! Scan-payload entry points.
//!
//! `GET /verify?id=<token>` is the URL a rendered barcode resolves to: a
//! scanning client lands here with the raw token. `POST /verify` accepts a
//! whole scan payload (URL form or bare-token fallback), decodes it, and
//! redeems in one step; this is what door-scanner firmware calls.

use crate::auth::AuthenticatedScanner;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use turnstile_core::redemption::RedeemOutcome;
use turnstile_core::token::{Token, decode_payload};
use turnstile_core::verify::InspectOutcome;

/// Query parameters of the verification URL embedded in scan payloads.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// The raw ticket token.
    pub id: String,
}

/// Request body for payload-based redemption.
#[derive(Debug, Deserialize)]
pub struct RedeemScanRequest {
    /// The scanned payload: either the full verification URL or a bare
    /// token (offline deployments).
    pub payload: String,
}

/// Preview the ticket a scan payload points at. Read-only.
pub async fn verify_scan(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<InspectOutcome>, AppError> {
    if query.id.trim().is_empty() {
        return Err(AppError::bad_request("invalid code: missing token"));
    }
    let outcome = state.verification.inspect(&Token::new(query.id)).await?;
    Ok(Json(outcome))
}

/// Decode a scanned payload and redeem the ticket it names.
///
/// Decode failures are a 400 ("invalid code"); a decoded-but-unknown token
/// is the normal `unknown` outcome.
pub async fn redeem_scan(
    scanner: AuthenticatedScanner,
    State(state): State<AppState>,
    Json(request): Json<RedeemScanRequest>,
) -> Result<Json<RedeemOutcome>, AppError> {
    let token = decode_payload(&request.payload)?;
    let outcome = state.verification.redeem(&token, &scanner.0.id).await?;
    Ok(Json(outcome))
}
