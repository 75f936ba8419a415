//! In-memory ticket store.
//!
//! Backs offline/LAN deployments (single process, no external database) and
//! fast, deterministic tests. A single async mutex over the map is held
//! across the whole read-decide-write of a redemption, which gives the
//! per-token serializability the store contract demands; at the scale of one
//! door scanner backend that coarse lock is not a bottleneck.

use crate::redemption::RedeemOutcome;
use crate::store::{StoreError, TicketStore, TransactionBody};
use crate::ticket::{EventRef, Ticket};
use crate::token::Token;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::Mutex;

/// `HashMap`-backed [`TicketStore`].
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    tickets: Mutex<HashMap<Token, Ticket>>,
}

impl MemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryTicketStore {
    fn create(
        &self,
        ticket: &Ticket,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let ticket = ticket.clone();
        Box::pin(async move {
            let mut tickets = self.tickets.lock().await;
            if tickets.contains_key(&ticket.token) {
                return Err(StoreError::AlreadyExists);
            }
            tickets.insert(ticket.token.clone(), ticket);
            Ok(())
        })
    }

    fn get(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Ticket>, StoreError>> + Send + '_>> {
        let token = token.clone();
        Box::pin(async move { Ok(self.tickets.lock().await.get(&token).cloned()) })
    }

    fn list_by_event(
        &self,
        event_ref: &EventRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, StoreError>> + Send + '_>> {
        let event_ref = event_ref.clone();
        Box::pin(async move {
            Ok(self
                .tickets
                .lock()
                .await
                .values()
                .filter(|ticket| ticket.event_ref == event_ref)
                .cloned()
                .collect())
        })
    }

    fn delete(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let token = token.clone();
        Box::pin(async move {
            self.tickets.lock().await.remove(&token);
            Ok(())
        })
    }

    fn redeem_transaction<'a>(
        &'a self,
        token: &'a Token,
        body: &'a TransactionBody,
    ) -> Pin<Box<dyn Future<Output = Result<RedeemOutcome, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            // The lock spans read, decision, and write: no other transaction
            // on any token can interleave, which trivially satisfies the
            // per-token serializability contract.
            let mut tickets = self.tickets.lock().await;
            let current = tickets.get(token).cloned();
            let transition = body(current);
            if let Some(ticket) = transition.write {
                tickets.insert(ticket.token.clone(), ticket);
            }
            Ok(transition.outcome)
        })
    }
}
