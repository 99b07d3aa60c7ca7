//! Database models for events and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::LedgerState;

/// A stored row from the `vault_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Domain the event concerns, if any.
    pub domain_id: Option<i64>,
    /// Event type discriminator (e.g. `"capital_deployed"`).
    pub event_type: String,
    /// JSONB payload with event-specific data.
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A ledger snapshot row from the `vault_snapshots` table.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Decoded ledger state.
    pub state: LedgerState,
    /// Snapshot timestamp.
    pub snapshot_at: DateTime<Utc>,
}
