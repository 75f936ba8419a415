//! Verification service: read-path inspection and the one-shot redemption
//! write path.

use crate::clock::Clock;
use crate::redemption::{self, RedeemOutcome};
use crate::store::{StoreError, TicketStore};
use crate::ticket::{Ticket, TicketState};
use crate::token::Token;
use serde::Serialize;
use std::sync::Arc;

/// Result of a read-only ticket inspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InspectOutcome {
    /// The token was never issued.
    Unknown,
    /// The ticket exists and has not been redeemed.
    Valid {
        /// The stored ticket.
        ticket: Ticket,
    },
    /// The ticket exists and was already redeemed.
    Redeemed {
        /// The stored ticket, with its redemption stamps.
        ticket: Ticket,
    },
}

/// Looks tickets up by token and performs idempotent one-shot redemption.
pub struct VerificationService {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl VerificationService {
    /// Create a verification service.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Report a ticket's current state without changing it.
    ///
    /// Used for the "preview before redeeming" step at the door.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] only for backend failures; an unknown token
    /// is the [`InspectOutcome::Unknown`] outcome, not an error.
    pub async fn inspect(&self, token: &Token) -> Result<InspectOutcome, StoreError> {
        let outcome = match self.store.get(token).await? {
            None => InspectOutcome::Unknown,
            Some(ticket) => match ticket.state {
                TicketState::Valid => InspectOutcome::Valid { ticket },
                TicketState::Redeemed => InspectOutcome::Redeemed { ticket },
            },
        };
        Ok(outcome)
    }

    /// Redeem a ticket exactly once.
    ///
    /// The whole read-decide-write runs inside the store's transaction on
    /// the token's record; among any number of concurrent calls on the same
    /// token, exactly one observes [`RedeemOutcome::Accepted`] and every
    /// other observes [`RedeemOutcome::AlreadyUsed`]. This is the only
    /// mutating entry point into ticket state; callers must never pair a
    /// read with a separate conditional write.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails or its retry budget
    /// is exhausted; every other result is a normal outcome.
    pub async fn redeem(
        &self,
        token: &Token,
        redeemer: &str,
    ) -> Result<RedeemOutcome, StoreError> {
        // Sampled once per call: the transition function stays pure, and a
        // transaction retry re-reads state but keeps the same stamp.
        let now = self.clock.now();
        let redeemer_owned = redeemer.to_string();

        let outcome = self
            .store
            .redeem_transaction(token, &move |current| {
                redemption::decide(current.as_ref(), &redeemer_owned, now)
            })
            .await?;

        match &outcome {
            RedeemOutcome::Accepted { ticket } => {
                tracing::info!(token = %token.prefix(), redeemer, event_ref = %ticket.event_ref, "Ticket redeemed");
                metrics::counter!("turnstile.redemptions", "outcome" => "accepted").increment(1);
            }
            RedeemOutcome::AlreadyUsed { ticket } => {
                tracing::info!(
                    token = %token.prefix(),
                    redeemer,
                    redeemed_by = ticket.redeemed_by.as_deref().unwrap_or(""),
                    "Redemption rejected: already used"
                );
                metrics::counter!("turnstile.redemptions", "outcome" => "already_used").increment(1);
            }
            RedeemOutcome::Unknown => {
                tracing::debug!(token = %token.prefix(), redeemer, "Redemption of unknown token");
                metrics::counter!("turnstile.redemptions", "outcome" => "unknown").increment(1);
            }
        }

        Ok(outcome)
    }
}
