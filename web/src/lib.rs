//! Axum HTTP surface for the Turnstile ticket engine.
//!
//! This crate is the imperative shell around `turnstile-core`: request
//! parsing, credential checks, and response shaping live here, while every
//! lifecycle decision is delegated to the core services.
//!
//! # Request Flow
//!
//! 1. **HTTP request** arrives at an Axum handler
//! 2. **Extract** the scanner principal (via the [`auth`] boundary) and the
//!    token or payload from the request
//! 3. **Call** the issuance or verification service
//! 4. **Map** the outcome (`accepted` / `already_used` / `unknown` /
//!    ticket listing) to JSON; outcomes are values, and only store
//!    failures become HTTP errors
//!
//! The handlers never pair a read with a conditional write: redemption goes
//! through the single transactional entry point on the core service, which
//! is what keeps double-scans safe.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod compose;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use auth::{AuthenticatedScanner, CredentialVerifier, Principal, StaticTokenVerifier};
pub use compose::{ComposeError, ComposedImage, ImageCaption, ImageComposer};
pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
