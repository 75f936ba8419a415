//! `PostgreSQL` ticket store for Turnstile.
//!
//! Implements the `TicketStore` trait from `turnstile-core` on top of sqlx.
//! The redemption path uses a row lock (`SELECT ... FOR UPDATE`) so the
//! read-decide-write of a redemption is atomic against every other attempt
//! on the same token: this is what lets horizontally scaled scanner backends
//! agree on a single winner without any shared memory.
//!
//! # Example
//!
//! ```no_run
//! use turnstile_postgres::PostgresTicketStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresTicketStore::new("postgres://localhost/turnstile").await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use turnstile_core::redemption::RedeemOutcome;
use turnstile_core::store::{StoreError, TicketStore, TransactionBody};
use turnstile_core::ticket::{EventRef, Ticket, TicketState};
use turnstile_core::token::Token;

/// How many times a redemption transaction is re-run after a write conflict
/// before surfacing `StoreError::Transient`. A stuck redemption at a door is
/// operationally worse than a visible failure the operator can retry.
const MAX_TXN_ATTEMPTS: u32 = 3;

/// Pause between conflict retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Per-attempt bound on lock waits and statement execution, applied with
/// `SET LOCAL` inside the transaction. A peer transaction wedged on the row
/// lock must surface as an error within this window, never as an indefinite
/// stall at the door.
const ATTEMPT_TIMEOUT: &str = "2s";

/// `PostgreSQL`-backed [`TicketStore`].
///
/// The pool is constructed once at startup and passed in explicitly; the
/// store never reaches for ambient/global connections.
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Connect to the given database URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be
    /// reached.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (for health checks and shutdown).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tickets table and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the DDL cannot be executed.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tickets (
                token        TEXT PRIMARY KEY,
                event_ref    TEXT NOT NULL,
                holder_name  TEXT NOT NULL,
                holder_phone TEXT NOT NULL,
                state        TEXT NOT NULL CHECK (state IN ('valid', 'redeemed')),
                issued_at    TIMESTAMPTZ NOT NULL,
                redeemed_at  TIMESTAMPTZ,
                redeemed_by  TEXT
            )
            ",
        )
        .execute(pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tickets_event ON tickets(event_ref)")
            .execute(pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    /// Convert a database row to a [`Ticket`].
    fn row_to_ticket(row: &sqlx::postgres::PgRow) -> Result<Ticket, StoreError> {
        let state_str: String = row.get("state");
        let state = TicketState::parse(&state_str)
            .ok_or_else(|| StoreError::Serialization(format!("unknown state: {state_str}")))?;

        let token: String = row.get("token");
        let event_ref: String = row.get("event_ref");
        let issued_at: DateTime<Utc> = row.get("issued_at");
        let redeemed_at: Option<DateTime<Utc>> = row.get("redeemed_at");
        let redeemed_by: Option<String> = row.get("redeemed_by");

        Ok(Ticket {
            token: Token::new(token),
            event_ref: EventRef::new(event_ref),
            holder_name: row.get("holder_name"),
            holder_phone: row.get("holder_phone"),
            state,
            issued_at,
            redeemed_at,
            redeemed_by,
        })
    }

    /// Map a sqlx error on a non-transactional operation.
    fn map_query_error(e: &sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Transient(e.to_string()),
        }
    }

    /// Whether the error is a conflict the transaction loop should retry:
    /// serialization failure (40001), deadlock (40P01), lock wait timeout
    /// (55P03), or statement timeout (57014).
    fn is_retryable_conflict(e: &sqlx::Error) -> bool {
        e.as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| {
                code == "40001" || code == "40P01" || code == "55P03" || code == "57014"
            })
    }

    /// One attempt of the redemption transaction: lock the row, run the pure
    /// body, apply its write, commit.
    async fn redeem_attempt(
        &self,
        token: &Token,
        body: &TransactionBody,
    ) -> Result<RedeemOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Bound this attempt: a row lock held by a wedged peer must turn
        // into a retryable error (55P03 / 57014), not an indefinite wait.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{ATTEMPT_TIMEOUT}'"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("SET LOCAL statement_timeout = '{ATTEMPT_TIMEOUT}'"))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r"
            SELECT token, event_ref, holder_name, holder_phone, state,
                   issued_at, redeemed_at, redeemed_by
            FROM tickets
            WHERE token = $1
            FOR UPDATE
            ",
        )
        .bind(token.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let current = match row {
            Some(row) => Some(
                Self::row_to_ticket(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
            ),
            None => None,
        };

        let transition = body(current);

        if let Some(ticket) = &transition.write {
            sqlx::query(
                r"
                UPDATE tickets
                SET state = $2, redeemed_at = $3, redeemed_by = $4
                WHERE token = $1
                ",
            )
            .bind(ticket.token.as_str())
            .bind(ticket.state.as_str())
            .bind(ticket.redeemed_at)
            .bind(ticket.redeemed_by.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(transition.outcome)
    }
}

impl TicketStore for PostgresTicketStore {
    fn create(
        &self,
        ticket: &Ticket,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let ticket = ticket.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO tickets (
                    token, event_ref, holder_name, holder_phone,
                    state, issued_at, redeemed_at, redeemed_by
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(ticket.token.as_str())
            .bind(ticket.event_ref.as_str())
            .bind(&ticket.holder_name)
            .bind(&ticket.holder_phone)
            .bind(ticket.state.as_str())
            .bind(ticket.issued_at)
            .bind(ticket.redeemed_at)
            .bind(ticket.redeemed_by.as_deref())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) => {
                    let unique_violation = e
                        .as_database_error()
                        .and_then(|db| db.code())
                        .is_some_and(|code| code == "23505");
                    if unique_violation {
                        tracing::warn!(token = %ticket.token.prefix(), "Token collision on insert");
                        Err(StoreError::AlreadyExists)
                    } else {
                        Err(Self::map_query_error(&e))
                    }
                }
            }
        })
    }

    fn get(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Ticket>, StoreError>> + Send + '_>> {
        let token = token.clone();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT token, event_ref, holder_name, holder_phone, state,
                       issued_at, redeemed_at, redeemed_by
                FROM tickets
                WHERE token = $1
                ",
            )
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_query_error(&e))?;

            row.as_ref().map(Self::row_to_ticket).transpose()
        })
    }

    fn list_by_event(
        &self,
        event_ref: &EventRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, StoreError>> + Send + '_>> {
        let event_ref = event_ref.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT token, event_ref, holder_name, holder_phone, state,
                       issued_at, redeemed_at, redeemed_by
                FROM tickets
                WHERE event_ref = $1
                ",
            )
            .bind(event_ref.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::map_query_error(&e))?;

            rows.iter().map(Self::row_to_ticket).collect()
        })
    }

    fn delete(
        &self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let token = token.clone();
        Box::pin(async move {
            // Unconditional: deleting an absent token or a redeemed ticket
            // is not an error.
            sqlx::query("DELETE FROM tickets WHERE token = $1")
                .bind(token.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| Self::map_query_error(&e))?;
            Ok(())
        })
    }

    fn redeem_transaction<'a>(
        &'a self,
        token: &'a Token,
        body: &'a TransactionBody,
    ) -> Pin<Box<dyn Future<Output = Result<RedeemOutcome, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut last_conflict = None;
            for attempt in 1..=MAX_TXN_ATTEMPTS {
                match self.redeem_attempt(token, body).await {
                    Ok(outcome) => return Ok(outcome),
                    Err(e) if Self::is_retryable_conflict(&e) => {
                        tracing::warn!(
                            token = %token.prefix(),
                            attempt,
                            error = %e,
                            "Redemption transaction conflict, retrying"
                        );
                        metrics::counter!("turnstile.store.txn_conflicts").increment(1);
                        last_conflict = Some(e);
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                    Err(sqlx::Error::Decode(e)) => {
                        return Err(StoreError::Serialization(e.to_string()));
                    }
                    Err(e) => return Err(Self::map_query_error(&e)),
                }
            }

            let detail =
                last_conflict.map_or_else(|| "write conflict".to_string(), |e| e.to_string());
            Err(StoreError::Transient(format!(
                "redemption transaction retries exhausted after {MAX_TXN_ATTEMPTS} attempts: {detail}"
            )))
        })
    }
}
