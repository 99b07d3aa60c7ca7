//! Persistence layer: PostgreSQL event log and ledger snapshots.
//!
//! Committed [`crate::domain::VaultEvent`]s are appended to `vault_events`;
//! the full [`crate::engine::LedgerState`] is written to `vault_snapshots`
//! on a timer and restored from the latest row at startup. The schema lives
//! in `migrations/` and is applied with [`PostgresPersistence::migrate`].

pub mod models;
pub mod postgres;

pub use models::{LedgerSnapshot, StoredEvent};
pub use postgres::PostgresPersistence;
