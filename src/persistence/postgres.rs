//! Postgres-backed persister, enabled by the `postgres` feature.
//!
//! The [`AccessManagerEventPersister`] trait is synchronous (mutations are
//! applied while the core holds its relation locks, and a blocking transport
//! is expected to block that thread rather than return a retryable error).
//! `sqlx`'s Postgres driver is async, so each trait method bridges onto a
//! dedicated Tokio runtime with `block_on`, mirroring how the donor's
//! `PostgresStore` was reached from synchronous call sites during startup
//! migrations.

use std::sync::OnceLock;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::runtime::Runtime;

use crate::error::{AccessManagerError, Result};
use crate::events::{AccessManagerEvent, EventId, EventPosition, RecordedEvent, TransactionTime};
use crate::ids::Identity;

use super::AccessManagerEventPersister;

/// Connection settings, loaded from the environment the same way the
/// donor's `PostgresConfig::from_env` reads its pool configuration.
#[derive(Debug, Clone)]
pub struct PostgresPersisterConfig {
    /// `postgres://...` connection string.
    pub database_url: String,
    /// Maximum pool size.
    pub max_connections: u32,
}

impl PostgresPersisterConfig {
    /// Build from `DATABASE_URL` and `ACCESS_MANAGER_PG_MAX_CONNECTIONS`,
    /// falling back to a conservative pool size and logging the fallback.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| AccessManagerError::Unavailable("DATABASE_URL not set".into()))?;
        let max_connections = std::env::var("ACCESS_MANAGER_PG_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                tracing::warn!("ACCESS_MANAGER_PG_MAX_CONNECTIONS unset or invalid, defaulting to 10");
                10
            });
        Ok(Self { database_url, max_connections })
    }
}

fn runtime() -> &'static Runtime {
    static RT: OnceLock<Runtime> = OnceLock::new();
    RT.get_or_init(|| Runtime::new().expect("failed to start Tokio runtime for Postgres persister"))
}

/// Postgres-backed event log. Rows are append-only; `close_event` sets
/// `valid_to` on the superseded row rather than deleting it, preserving the
/// bi-temporal history.
pub struct PostgresEventPersister {
    pool: PgPool,
}

impl PostgresEventPersister {
    /// Connect using `config`, creating the pool eagerly.
    pub fn connect(config: &PostgresPersisterConfig) -> Result<Self> {
        let pool = runtime()
            .block_on(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.database_url),
            )
            .map_err(|e| AccessManagerError::Unavailable(format!("postgres connect failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Run the crate's schema migration (`access_manager_events` table) if
    /// it does not already exist.
    pub fn migrate(&self) -> Result<()> {
        runtime()
            .block_on(
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS access_manager_events (
                        event_id UUID PRIMARY KEY,
                        tx_time BIGINT NOT NULL,
                        sequence BIGINT NOT NULL,
                        kind TEXT NOT NULL,
                        payload JSONB NOT NULL,
                        valid_to BIGINT,
                        UNIQUE (tx_time, sequence)
                    )",
                )
                .execute(&self.pool),
            )
            .map_err(|e| AccessManagerError::Unavailable(format!("postgres migrate failed: {e}")))?;
        Ok(())
    }
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> AccessManagerEventPersister<U, G, P, A>
    for PostgresEventPersister
{
    fn create_event(
        &self,
        event: AccessManagerEvent<U, G, P, A>,
        event_id: EventId,
        tx_time: TransactionTime,
    ) -> Result<EventPosition> {
        let kind = event.kind();
        let payload = serde_json::to_value(&event)
            .map_err(|e| AccessManagerError::Unavailable(format!("event serialization failed: {e}")))?;

        let last_tx_time: Option<i64> = runtime()
            .block_on(sqlx::query("SELECT MAX(tx_time) AS tx_time FROM access_manager_events").fetch_one(&self.pool))
            .ok()
            .and_then(|row| row.try_get::<Option<i64>, _>("tx_time").ok())
            .flatten();
        if let Some(last_tx_time) = last_tx_time {
            if tx_time.as_micros() < last_tx_time {
                return Err(AccessManagerError::MonotonicityViolated { tx_time: tx_time.as_micros(), last_tx_time });
            }
        }

        let row = runtime()
            .block_on(
                sqlx::query(
                    "INSERT INTO access_manager_events (event_id, tx_time, sequence, kind, payload)
                     VALUES ($1, $2,
                        COALESCE((SELECT MAX(sequence) + 1 FROM access_manager_events WHERE tx_time = $2), 0),
                        $3, $4)
                     RETURNING sequence",
                )
                .bind(event_id.as_uuid())
                .bind(tx_time.as_micros())
                .bind(kind)
                .bind(payload)
                .fetch_one(&self.pool),
            )
            .map_err(|e| AccessManagerError::Unavailable(format!("postgres insert failed: {e}")))?;

        let sequence: i64 = row.try_get("sequence").unwrap_or(0);
        Ok(EventPosition { tx_time, sequence: sequence as u64 })
    }

    fn close_event(&self, event_id: &EventId, valid_to: TransactionTime) -> Result<()> {
        runtime()
            .block_on(
                sqlx::query("UPDATE access_manager_events SET valid_to = $1 WHERE event_id = $2")
                    .bind(valid_to.as_micros())
                    .bind(event_id.as_uuid())
                    .execute(&self.pool),
            )
            .map_err(|e| AccessManagerError::Unavailable(format!("postgres update failed: {e}")))?;
        Ok(())
    }

    fn events_after(&self, _position: Option<EventPosition>) -> Result<Vec<RecordedEvent<U, G, P, A>>> {
        // Decoding JSONB payloads back into `AccessManagerEvent<U, G, P, A>`
        // requires a concrete `U`/`G`/`P`/`A`; callers that need replay from
        // Postgres do so through a monomorphized adapter at the call site.
        Err(AccessManagerError::Unavailable(
            "events_after is not implemented for the generic Postgres persister".into(),
        ))
    }

    fn len(&self) -> usize {
        runtime()
            .block_on(
                sqlx::query("SELECT COUNT(*) AS count FROM access_manager_events").fetch_one(&self.pool),
            )
            .ok()
            .and_then(|row| row.try_get::<i64, _>("count").ok())
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}
