//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{LedgerSnapshot, StoredEvent};
use crate::config::VaultConfig;
use crate::domain::{DomainId, VaultEvent};
use crate::engine::LedgerState;
use crate::error::VaultError;

fn db_error(e: impl std::fmt::Display) -> VaultError {
    VaultError::Persistence(e.to_string())
}

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
///
/// Ledger state is serialized with `serde_json` into text and cast to
/// `jsonb` on insert, then read back as text: u128 amounts survive the round
/// trip without passing through `serde_json::Value`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &VaultConfig) -> Result<Self, VaultError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(db_error)?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), VaultError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(db_error)?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn save_event(&self, event: &VaultEvent) -> Result<i64, VaultError> {
        let payload = serde_json::to_string(event).map_err(db_error)?;
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO vault_events (domain_id, event_type, payload) \
             VALUES ($1, $2, $3::jsonb) RETURNING id",
        )
        .bind(event.domain_id().map(|d| i64::from(d.get())))
        .bind(event.event_type_str())
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row)
    }

    /// Saves a ledger state snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn save_snapshot(&self, state: &LedgerState) -> Result<i64, VaultError> {
        let state_json = serde_json::to_string(state).map_err(db_error)?;
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO vault_snapshots (status, state_json) \
             VALUES ($1, $2::jsonb) RETURNING id",
        )
        .bind(state.status.to_string())
        .bind(state_json)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row)
    }

    /// Loads the most recent snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure or if the
    /// stored state cannot be decoded.
    pub async fn load_latest_snapshot(&self) -> Result<Option<LedgerSnapshot>, VaultError> {
        let row = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
            "SELECT id, state_json::text, snapshot_at FROM vault_snapshots \
             ORDER BY snapshot_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some((id, state_json, snapshot_at)) = row else {
            return Ok(None);
        };
        let state = serde_json::from_str::<LedgerState>(&state_json)
            .map_err(|e| VaultError::Persistence(format!("snapshot {id} is unreadable: {e}")))?;
        Ok(Some(LedgerSnapshot {
            id,
            state,
            snapshot_at,
        }))
    }

    /// Loads events after the given timestamp, optionally filtered by domain.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn load_events_after(
        &self,
        after: DateTime<Utc>,
        domain_id: Option<DomainId>,
    ) -> Result<Vec<StoredEvent>, VaultError> {
        let rows = if let Some(domain) = domain_id {
            sqlx::query_as::<_, (i64, Option<i64>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, domain_id, event_type, payload, created_at FROM vault_events \
                 WHERE created_at > $1 AND domain_id = $2 ORDER BY id ASC",
            )
            .bind(after)
            .bind(i64::from(domain.get()))
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, (i64, Option<i64>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, domain_id, event_type, payload, created_at FROM vault_events \
                 WHERE created_at > $1 ORDER BY id ASC",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, domain_id, event_type, payload, created_at)| StoredEvent {
                    id,
                    domain_id,
                    event_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }

    /// Deletes snapshots older than the given number of days, always keeping
    /// the newest one.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn delete_old_snapshots(&self, before_days: u64) -> Result<u64, VaultError> {
        let cutoff = i64::try_from(before_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let result = sqlx::query(
            "DELETE FROM vault_snapshots WHERE snapshot_at < $1 \
             AND id <> (SELECT id FROM vault_snapshots ORDER BY snapshot_at DESC, id DESC LIMIT 1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
