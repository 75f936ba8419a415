//! Domain types for admission tickets.
//!
//! A [`Ticket`] is the central entity: one scannable admission right for one
//! event, identified by its [`Token`] and moving through a two-state
//! lifecycle (`Valid` → `Redeemed`, never back).

use crate::token::Token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the event a ticket admits to.
///
/// Opaque to the lifecycle engine: events are managed elsewhere and this
/// reference is never dereferenced or mutated here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRef(String);

impl EventRef {
    /// Wrap an event identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// View the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored lifecycle state of a ticket.
///
/// "Unknown" (a token that was never issued) is a read-path outcome, not a
/// stored state; see `InspectOutcome` and `RedeemOutcome`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Issued and not yet redeemed.
    Valid,
    /// Redeemed exactly once; terminal.
    Redeemed,
}

impl TicketState {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Redeemed => "redeemed",
        }
    }

    /// Parse the database string representation.
    ///
    /// Returns `None` for strings that are not a known state; callers at the
    /// persistence boundary map that to their corruption error.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(Self::Valid),
            "redeemed" => Some(Self::Redeemed),
            _ => None,
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One admission ticket.
///
/// Invariants upheld by the issuance service and redemption state machine:
///
/// - `token`, `event_ref`, and the holder fields are immutable after issuance.
/// - `redeemed_at`/`redeemed_by` are `Some` if and only if
///   `state == Redeemed`, and are written exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque unique identifier; primary key and sole redemption credential.
    pub token: Token,
    /// The event this ticket admits to.
    pub event_ref: EventRef,
    /// Holder display name. Display/search only, never authorization.
    pub holder_name: String,
    /// Holder phone number. Display/search only, never authorization.
    pub holder_phone: String,
    /// Current lifecycle state.
    pub state: TicketState,
    /// When the ticket was issued.
    pub issued_at: DateTime<Utc>,
    /// When the ticket was redeemed, set on the `Valid → Redeemed` transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Who redeemed the ticket (authenticated principal of the scanner).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_by: Option<String>,
}

impl Ticket {
    /// Construct a freshly issued ticket in the `Valid` state.
    #[must_use]
    pub const fn issued(
        token: Token,
        event_ref: EventRef,
        holder_name: String,
        holder_phone: String,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            event_ref,
            holder_name,
            holder_phone,
            state: TicketState::Valid,
            issued_at,
            redeemed_at: None,
            redeemed_by: None,
        }
    }
}
