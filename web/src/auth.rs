//! Credential verification boundary.
//!
//! The engine does not validate credentials itself: an external identity
//! provider does. This module defines the seam: a [`CredentialVerifier`]
//! that resolves an inbound bearer credential to a [`Principal`] or to
//! nothing. It also ships a deployment-friendly static-token implementation
//! and the Axum extractor handlers use to require an authenticated scanner.
//!
//! The authenticated principal's identifier is what ends up in a ticket's
//! `redeemed_by` field.

use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::collections::HashMap;

use crate::error::AppError;

/// An authenticated caller (a door scanner, an operator console).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier, recorded as `redeemed_by` on redemption.
    pub id: String,
}

/// Resolves an inbound credential to a principal.
///
/// Implementations are external collaborators (an identity provider client,
/// a session validator); the engine only consumes the result.
pub trait CredentialVerifier: Send + Sync {
    /// Verify a bearer credential. `None` means "no principal"; the request
    /// is rejected with 401 by the extractor.
    fn verify(&self, credential: &str) -> Option<Principal>;
}

/// Verifier backed by a fixed credential → principal table.
///
/// Suits small deployments where each scanner device gets a pre-shared
/// token; larger ones plug in their identity provider instead.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    credentials: HashMap<String, String>,
}

impl StaticTokenVerifier {
    /// Build a verifier from `(credential, principal_id)` pairs.
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            credentials: pairs.into_iter().collect(),
        }
    }
}

impl CredentialVerifier for StaticTokenVerifier {
    fn verify(&self, credential: &str) -> Option<Principal> {
        self.credentials.get(credential).map(|id| Principal {
            id: id.clone(),
        })
    }
}

/// Extractor that requires a verified scanner principal.
///
/// Reads `Authorization: Bearer <credential>` and runs it through the
/// state's [`CredentialVerifier`]. Handlers that mutate tickets (issue,
/// redeem, revoke) take this as their first argument.
#[derive(Clone, Debug)]
pub struct AuthenticatedScanner(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedScanner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing credentials"))?;

        let credential = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("expected bearer credential"))?;

        state
            .verifier
            .verify(credential)
            .map(AuthenticatedScanner)
            .ok_or_else(|| AppError::unauthorized("invalid credentials"))
    }
}
