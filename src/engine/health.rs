//! Health monitor: detects anomalies and trips the emergency pause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::Ledger;
use super::state::LedgerStatus;
use crate::domain::{Address, DomainId};
use crate::error::VaultError;

/// Which anomalies pause the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Pause when a domain holding capital has a stale report.
    pub pause_on_stale_report: bool,
    /// Pause when the idle buffer is below the reserve.
    pub pause_on_buffer_breach: bool,
    /// Pause when an accounting identity fails.
    pub pause_on_invariant_violation: bool,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            pause_on_stale_report: true,
            pause_on_buffer_breach: false,
            pause_on_invariant_violation: true,
        }
    }
}

/// A detected problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A domain holding capital has not reported within the staleness
    /// window.
    StaleReport {
        /// Affected domain.
        domain_id: DomainId,
        /// Last applied report, if any.
        last_report_time: Option<DateTime<Utc>>,
        /// Seconds since the last report (or registration).
        age_secs: i64,
    },
    /// The idle buffer is below the required reserve.
    BufferBreach {
        /// Idle buffer (string-encoded u128).
        buffer: String,
        /// Required reserve (string-encoded u128).
        required: String,
    },
    /// An accounting identity does not hold.
    InvariantViolation {
        /// Description.
        detail: String,
    },
}

impl Anomaly {
    /// Short name of the anomaly kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StaleReport { .. } => "stale_report",
            Self::BufferBreach { .. } => "buffer_breach",
            Self::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

/// Point-in-time health assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Assessment time.
    pub checked_at: DateTime<Utc>,
    /// Ledger lifecycle status.
    pub status: LedgerStatus,
    /// Anomalies found, empty when healthy.
    pub anomalies: Vec<Anomaly>,
}

impl HealthReport {
    /// `true` if no anomalies were found.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Domains with stale reports.
    #[must_use]
    pub fn stale_domains(&self) -> Vec<DomainId> {
        self.anomalies
            .iter()
            .filter_map(|a| match a {
                Anomaly::StaleReport { domain_id, .. } => Some(*domain_id),
                _ => None,
            })
            .collect()
    }
}

/// What [`HealthMonitor::enforce`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enforcement {
    /// The assessment acted on.
    pub report: HealthReport,
    /// `true` if this call paused the vault.
    pub paused: bool,
}

/// Inspects a ledger and pauses it on configured anomalies, acting as a
/// Pauser identity.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    identity: Address,
    policy: HealthPolicy,
}

impl HealthMonitor {
    /// Creates a monitor acting as `identity`.
    #[must_use]
    pub const fn new(identity: Address, policy: HealthPolicy) -> Self {
        Self { identity, policy }
    }

    /// Address the monitor pauses with.
    #[must_use]
    pub const fn identity(&self) -> Address {
        self.identity
    }

    /// Lists anomalies at `now` without changing anything.
    #[must_use]
    pub fn inspect(&self, ledger: &Ledger, now: DateTime<Utc>) -> HealthReport {
        let state = ledger.state();
        let staleness = state.params.rebalance.staleness();
        let mut anomalies: Vec<Anomaly> = state
            .registry
            .active()
            .filter(|r| r.deployed_amount > 0 && r.is_stale(now, staleness))
            .map(|r| {
                let reference = r.last_report_time.unwrap_or(r.registered_at);
                Anomaly::StaleReport {
                    domain_id: r.domain_id,
                    last_report_time: r.last_report_time,
                    age_secs: now.signed_duration_since(reference).num_seconds(),
                }
            })
            .collect();

        if state.params.buffer_management_enabled {
            match state.required_buffer() {
                Ok(required) if state.idle_buffer < required => {
                    anomalies.push(Anomaly::BufferBreach {
                        buffer: state.idle_buffer.to_string(),
                        required: required.to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) => anomalies.push(Anomaly::InvariantViolation {
                    detail: e.to_string(),
                }),
            }
        }

        anomalies.extend(
            state
                .invariant_violations()
                .into_iter()
                .map(|detail| Anomaly::InvariantViolation { detail }),
        );

        HealthReport {
            checked_at: now,
            status: state.status,
            anomalies,
        }
    }

    /// Inspects and pauses if any anomaly is configured to trip.
    ///
    /// # Errors
    ///
    /// Propagates a failed pause, typically a missing Pauser role.
    pub fn enforce(&self, ledger: &mut Ledger, now: DateTime<Utc>) -> Result<Enforcement, VaultError> {
        let report = self.inspect(ledger, now);
        let trips = report.anomalies.iter().any(|a| self.trips(a));
        let paused = trips && report.status == LedgerStatus::Active;
        if paused {
            for anomaly in &report.anomalies {
                tracing::warn!(kind = anomaly.kind(), ?anomaly, "health anomaly");
            }
            ledger.emergency_pause(self.identity, now)?;
        }
        Ok(Enforcement { report, paused })
    }

    const fn trips(&self, anomaly: &Anomaly) -> bool {
        match anomaly {
            Anomaly::StaleReport { .. } => self.policy.pause_on_stale_report,
            Anomaly::BufferBreach { .. } => self.policy.pause_on_buffer_breach,
            Anomaly::InvariantViolation { .. } => self.policy.pause_on_invariant_violation,
        }
    }
}
