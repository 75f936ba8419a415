//! Application state for the Turnstile HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers: the ticket store,
//! the lifecycle services built over it, the credential verifier, and the
//! optional image-composition collaborator. Everything is behind `Arc` and
//! cloned cheaply per request.

use crate::auth::CredentialVerifier;
use crate::compose::ImageComposer;
use std::sync::Arc;
use turnstile_core::clock::SystemClock;
use turnstile_core::issue::IssuanceService;
use turnstile_core::store::TicketStore;
use turnstile_core::token::UuidMinter;
use turnstile_core::verify::VerificationService;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ticket store, for the read/list/delete paths handlers drive directly.
    pub store: Arc<dyn TicketStore>,

    /// Issuance service (mint + persist + payload encoding).
    pub issuance: Arc<IssuanceService>,

    /// Verification service (inspect + one-shot redeem).
    pub verification: Arc<VerificationService>,

    /// Credential verifier for scanner principals.
    pub verifier: Arc<dyn CredentialVerifier>,

    /// Image-composition collaborator; `None` when no renderer is deployed,
    /// in which case the image endpoint reports unavailable.
    pub composer: Option<Arc<dyn ImageComposer>>,
}

impl AppState {
    /// Assemble the state with production defaults: UUID token minting and
    /// the system clock.
    ///
    /// `base_url` is the deployment's verification base URL; `None` selects
    /// offline mode (bare-token scan payloads).
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        verifier: Arc<dyn CredentialVerifier>,
        composer: Option<Arc<dyn ImageComposer>>,
        base_url: Option<String>,
    ) -> Self {
        let clock = Arc::new(SystemClock);
        let issuance = Arc::new(IssuanceService::new(
            store.clone(),
            Arc::new(UuidMinter),
            clock.clone(),
            base_url,
        ));
        let verification = Arc::new(VerificationService::new(store.clone(), clock));

        Self {
            store,
            issuance,
            verification,
            verifier,
            composer,
        }
    }
}
