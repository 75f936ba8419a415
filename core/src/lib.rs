//! Ticket lifecycle and redemption engine.
//!
//! This crate is the core of Turnstile: it mints opaque single-use admission
//! tokens, encodes them into scan payloads, and redeems tickets exactly once
//! even when verification attempts race: two door scanners hitting the same
//! ticket near-simultaneously must agree on a single winner.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  IssuanceService        VerificationService │  ← the two entry points
//! ├─────────────────────────────────────────────┤
//! │  redemption::decide (pure state machine)    │  ← no I/O, re-executable
//! ├─────────────────────────────────────────────┤
//! │  TicketStore (transactional boundary)       │  ← Postgres or in-memory
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Correctness comes from the store, not from in-process locks: every
//! redemption is a transactional read-decide-write on the one record
//! identified by the token, so horizontally scaled scanner backends agree on
//! the outcome without shared memory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod issue;
pub mod redemption;
pub mod store;
pub mod ticket;
pub mod token;
pub mod verify;

// === Re-exports ===

pub use clock::{Clock, FixedClock, SystemClock};
pub use issue::{IssuanceService, IssueError, IssuedTicket};
pub use redemption::{RedeemOutcome, Transition, decide};
pub use store::memory::MemoryTicketStore;
pub use store::{StoreError, TicketStore, TransactionBody};
pub use ticket::{EventRef, Ticket, TicketState};
pub use token::{DecodeError, Token, TokenMinter, UuidMinter, decode_payload, encode_payload};
pub use verify::{InspectOutcome, VerificationService};
