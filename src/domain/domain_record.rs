//! Domain record: the vault's view of one remote child vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, DomainId};

/// Lifecycle status of a registered domain.
///
/// Records are never deleted: retirement flips the status to
/// [`DomainStatus::Inactive`] and keeps the accounting history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// Accepts deployments and inbound messages.
    Active,
    /// Retired. Rejects deployments and inbound messages.
    Inactive,
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Allocation and yield state for a single remote domain.
///
/// `deployed_amount`, `reported_apy_bps` and `last_report_time` are
/// overwritten (never accumulated) by inbound yield reports, so applying the
/// same report twice leaves the record unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Domain identifier (immutable after registration).
    pub domain_id: DomainId,

    /// Address of the child vault inside the remote domain. Inbound
    /// messages must originate from this address.
    pub vault_address: Address,

    /// Capital the vault believes is deployed in the domain, in stablecoin
    /// base units.
    pub deployed_amount: u128,

    /// Last reported annualized yield in basis points.
    pub reported_apy_bps: u32,

    /// Timestamp carried by the last applied yield report. `None` until the
    /// first report arrives.
    pub last_report_time: Option<DateTime<Utc>>,

    /// Lifecycle status.
    pub status: DomainStatus,

    /// First registration timestamp.
    pub registered_at: DateTime<Utc>,
}

impl DomainRecord {
    /// Creates a freshly registered, active record with nothing deployed.
    #[must_use]
    pub fn new(domain_id: DomainId, vault_address: Address, now: DateTime<Utc>) -> Self {
        Self {
            domain_id,
            vault_address,
            deployed_amount: 0,
            reported_apy_bps: 0,
            last_report_time: None,
            status: DomainStatus::Active,
            registered_at: now,
        }
    }

    /// Returns `true` while the domain is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == DomainStatus::Active
    }

    /// Returns `true` when no report has arrived within `staleness` of `now`.
    ///
    /// A domain that never reported counts as stale once `staleness` has
    /// elapsed since registration.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        let reference = self.last_report_time.unwrap_or(self.registered_at);
        now.signed_duration_since(reference) > staleness
    }
}

/// Lightweight summary of a record for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    /// Domain identifier.
    pub domain_id: DomainId,
    /// Child vault address.
    pub vault_address: Address,
    /// Deployed capital (string-encoded u128).
    pub deployed_amount: String,
    /// Reported APY in basis points.
    pub reported_apy_bps: u32,
    /// Last report timestamp.
    pub last_report_time: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: DomainStatus,
}

impl From<&DomainRecord> for DomainSummary {
    fn from(record: &DomainRecord) -> Self {
        Self {
            domain_id: record.domain_id,
            vault_address: record.vault_address,
            deployed_amount: record.deployed_amount.to_string(),
            reported_apy_bps: record.reported_apy_bps,
            last_report_time: record.last_report_time,
            status: record.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_record_is_active_and_empty() {
        let record = DomainRecord::new(DomainId::new(1), Address::repeat_byte(1), Utc::now());
        assert!(record.is_active());
        assert_eq!(record.deployed_amount, 0);
        assert!(record.last_report_time.is_none());
    }

    #[test]
    fn staleness_uses_registration_until_first_report() {
        let now = Utc::now();
        let record = DomainRecord::new(DomainId::new(1), Address::repeat_byte(1), now);
        assert!(!record.is_stale(now + Duration::hours(1), Duration::hours(2)));
        assert!(record.is_stale(now + Duration::hours(3), Duration::hours(2)));
    }

    #[test]
    fn staleness_uses_last_report() {
        let now = Utc::now();
        let mut record = DomainRecord::new(DomainId::new(1), Address::repeat_byte(1), now);
        record.last_report_time = Some(now + Duration::hours(5));
        assert!(!record.is_stale(now + Duration::hours(6), Duration::hours(2)));
    }

    #[test]
    fn summary_string_encodes_amount() {
        let mut record = DomainRecord::new(DomainId::new(7), Address::repeat_byte(7), Utc::now());
        record.deployed_amount = 1_000_000;
        let summary = DomainSummary::from(&record);
        assert_eq!(summary.deployed_amount, "1000000");
        assert_eq!(summary.status, DomainStatus::Active);
    }
}
