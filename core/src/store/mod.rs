//! Ticket store abstraction, the sole persistence boundary.
//!
//! The lifecycle engine never talks to a database directly; everything goes
//! through [`TicketStore`]. The one non-obvious operation is
//! [`TicketStore::redeem_transaction`]: an atomic read-decide-write on the
//! single record identified by a token. Any backend with serializable
//! isolation scoped to one row/document satisfies the contract: `SELECT ...
//! FOR UPDATE` in the Postgres implementation, a map-wide mutex in the
//! in-memory one.
//!
//! # Implementations
//!
//! - `PostgresTicketStore` (in `turnstile-postgres`): production backend
//! - [`MemoryTicketStore`](memory::MemoryTicketStore): offline/LAN
//!   deployments and fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn TicketStore>`)
//! shared across request handlers.

pub mod memory;

use crate::redemption::{RedeemOutcome, Transition};
use crate::ticket::{EventRef, Ticket};
use crate::token::Token;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by ticket store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A ticket with this token already exists.
    ///
    /// Statistically unreachable with full-width tokens, but the primary-key
    /// backstop must be handled, not ignored: issuance mints a fresh token
    /// and retries.
    #[error("ticket with this token already exists")]
    AlreadyExists,

    /// Transient failure (write conflict retries exhausted, timeout).
    /// Callers may retry with backoff.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The store could not be reached. Callers may retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded into a ticket.
    #[error("corrupt ticket record: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the caller may retry the operation with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Unavailable(_))
    }
}

/// The pure body of a redemption transaction.
///
/// Given the current ticket (or its absence), returns what to write and what
/// to report. Implementations of [`TicketStore::redeem_transaction`] may
/// re-execute the body after a write conflict, so it must be a pure function
/// of its input.
pub type TransactionBody = dyn Fn(Option<Ticket>) -> Transition + Send + Sync;

/// Persistence boundary for tickets.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the store is shared across request
/// tasks with no in-process coordination; correctness of concurrent
/// redemption comes from the backend's transaction mechanism, not from a
/// mutex around the engine.
pub trait TicketStore: Send + Sync {
    /// Insert a newly issued ticket.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyExists`]: the token collides with an existing
    ///   ticket
    /// - [`StoreError::Unavailable`] / [`StoreError::Transient`]: backend
    ///   failure
    fn create(
        &self,
        ticket: &Ticket,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Point lookup by token.
    ///
    /// `Ok(None)` means the token was never issued: a normal outcome, never
    /// an error. May be served from a stale replica; the transactional
    /// redemption path never goes through this method.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only for backend failures.
    fn get(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Ticket>, StoreError>> + Send + '_>>;

    /// All tickets issued for an event, in no particular order.
    ///
    /// Display callers sort by `issued_at` descending.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only for backend failures.
    fn list_by_event(
        &self,
        event_ref: &EventRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, StoreError>> + Send + '_>>;

    /// Remove a ticket (administrative revocation).
    ///
    /// Idempotent: deleting an absent token is `Ok(())`, and removal is safe
    /// in either lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only for backend failures.
    fn delete(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Atomic read-decide-write on the record identified by `token`.
    ///
    /// Reads the current ticket, runs `body`, writes `Transition::write` if
    /// present, and returns the body's outcome, all with the guarantee that
    /// no other transaction on the same token interleaves between the read
    /// and the write. Concurrent `redeem` calls on one token therefore
    /// serialize: exactly one observes `Accepted`.
    ///
    /// Implementations retry the whole read-decide-write on backend write
    /// conflicts, bounded by an attempt budget and a per-attempt timeout:
    /// a lock held by a wedged peer surfaces as [`StoreError::Transient`]
    /// within the window instead of blocking the caller indefinitely.
    /// `body` must be pure.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Transient`]: conflict retries or the time budget
    ///   exhausted
    /// - [`StoreError::Unavailable`]: backend unreachable
    fn redeem_transaction<'a>(
        &'a self,
        token: &'a Token,
        body: &'a TransactionBody,
    ) -> Pin<Box<dyn Future<Output = Result<RedeemOutcome, StoreError>> + Send + 'a>>;
}
