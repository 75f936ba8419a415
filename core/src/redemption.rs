//! The redemption state machine.
//!
//! [`decide`] is the pure transition function at the heart of at-most-once
//! redemption. It performs no I/O: given the current ticket (or its absence),
//! the redeemer's identity, and the current time, it returns what to write
//! and which outcome to report. The verification service runs it inside the
//! store's transactional read-modify-write, and that purity is what makes the
//! store's automatic retry safe: the body can be re-executed against a fresh
//! read without side effects.

use crate::ticket::{Ticket, TicketState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a redemption attempt.
///
/// All three variants are normal results, not errors: every `redeem` call
/// resolves to exactly one of these (or a store error), and callers must
/// render each differently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemOutcome {
    /// The token was never issued.
    Unknown,
    /// This call performed the `Valid → Redeemed` transition. Carries the
    /// ticket as written, with fresh `redeemed_at`/`redeemed_by` stamps.
    Accepted {
        /// The ticket after the transition.
        ticket: Ticket,
    },
    /// The ticket was already redeemed. Carries the stored ticket with the
    /// original stamps intact: an idempotent no-op, never an overwrite.
    AlreadyUsed {
        /// The ticket as previously redeemed.
        ticket: Ticket,
    },
}

/// What a transaction body asks the store to do: optionally write a new
/// ticket state, and report an outcome either way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// `Some` when the ticket row must be updated; `None` for the no-write
    /// paths (unknown token, already redeemed).
    pub write: Option<Ticket>,
    /// The outcome to report to the caller.
    pub outcome: RedeemOutcome,
}

/// Decide the redemption transition for one ticket.
///
/// Transition table:
///
/// | Current    | Next       | Write | Outcome       |
/// |------------|------------|-------|---------------|
/// | absent     | absent     | no    | `Unknown`     |
/// | `Valid`    | `Redeemed` | yes   | `Accepted`    |
/// | `Redeemed` | `Redeemed` | no    | `AlreadyUsed` |
///
/// `now` is passed in rather than sampled here so the function stays pure;
/// the caller samples the clock once per transaction attempt.
#[must_use]
pub fn decide(current: Option<&Ticket>, redeemer: &str, now: DateTime<Utc>) -> Transition {
    match current {
        None => Transition {
            write: None,
            outcome: RedeemOutcome::Unknown,
        },
        Some(ticket) => match ticket.state {
            TicketState::Valid => {
                let mut redeemed = ticket.clone();
                redeemed.state = TicketState::Redeemed;
                redeemed.redeemed_at = Some(now);
                redeemed.redeemed_by = Some(redeemer.to_string());
                Transition {
                    write: Some(redeemed.clone()),
                    outcome: RedeemOutcome::Accepted { ticket: redeemed },
                }
            }
            TicketState::Redeemed => Transition {
                write: None,
                outcome: RedeemOutcome::AlreadyUsed {
                    ticket: ticket.clone(),
                },
            },
        },
    }
}
