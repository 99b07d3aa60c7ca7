//! Rebalance decision rule and rate-limit bookkeeping.
//!
//! [`decide`] is a pure function of the registry, the deployable buffer
//! surplus, the rebalance history and `now`. The ledger executes the
//! resulting [`RebalancePlan`] atomically.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainId, DomainRecord, DomainRegistry};
use crate::error::{PolicyViolation, VaultError};

/// Upper bound on any policy duration: ten years.
pub const MAX_POLICY_SECS: i64 = 315_360_000;

/// Thresholds governing automatic and forced rebalances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePolicy {
    /// Minimum APY advantage (strictly exceeded) before capital moves.
    pub min_apy_diff_bps: u32,
    /// Minimum seconds between two rebalances.
    pub cooldown_secs: i64,
    /// Length of the rolling rate-limit window in seconds.
    pub window_secs: i64,
    /// Maximum rebalances inside one window.
    pub max_per_window: usize,
    /// Age after which a domain's report is stale.
    pub staleness_secs: i64,
}

impl Default for RebalancePolicy {
    fn default() -> Self {
        Self {
            min_apy_diff_bps: 100,
            cooldown_secs: 3_600,
            window_secs: 86_400,
            max_per_window: 6,
            staleness_secs: 21_600,
        }
    }
}

impl RebalancePolicy {
    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyViolation::InvalidParameter`] naming the bad field.
    pub fn validate(&self) -> Result<(), VaultError> {
        let invalid = |name: &'static str, reason: &str| -> VaultError {
            PolicyViolation::InvalidParameter {
                name,
                reason: reason.to_string(),
            }
            .into()
        };
        if self.cooldown_secs < 0 {
            return Err(invalid("cooldown_secs", "must not be negative"));
        }
        if [self.cooldown_secs, self.window_secs, self.staleness_secs]
            .iter()
            .any(|secs| *secs > MAX_POLICY_SECS)
        {
            return Err(invalid("rebalance", "durations are limited to ten years"));
        }
        if self.window_secs <= 0 {
            return Err(invalid("window_secs", "must be positive"));
        }
        if self.max_per_window == 0 {
            return Err(invalid("max_per_window", "must be at least 1"));
        }
        if self.staleness_secs <= 0 {
            return Err(invalid("staleness_secs", "must be positive"));
        }
        Ok(())
    }

    /// Staleness threshold as a duration.
    #[must_use]
    pub fn staleness(&self) -> Duration {
        Duration::seconds(self.staleness_secs)
    }
}

/// Timestamps of executed rebalances, pruned to the rolling window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceHistory {
    executions: VecDeque<DateTime<Utc>>,
    last_rebalance_at: Option<DateTime<Utc>>,
}

impl RebalanceHistory {
    /// Timestamp of the most recent rebalance.
    #[must_use]
    pub const fn last_rebalance_at(&self) -> Option<DateTime<Utc>> {
        self.last_rebalance_at
    }

    /// Seconds of cooldown left at `now`, if any.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, policy: &RebalancePolicy) -> Option<i64> {
        let last = self.last_rebalance_at?;
        let elapsed = now.signed_duration_since(last).num_seconds();
        let remaining = policy.cooldown_secs.saturating_sub(elapsed);
        (remaining > 0).then_some(remaining)
    }

    /// Rebalances executed within the window ending at `now`.
    #[must_use]
    pub fn executed_in_window(&self, now: DateTime<Utc>, policy: &RebalancePolicy) -> usize {
        let window_start = now - Duration::seconds(policy.window_secs);
        self.executions.iter().filter(|t| **t > window_start).count()
    }

    /// Fails with the matching [`crate::error::StateViolation`] if a
    /// rebalance may not run at `now`.
    ///
    /// # Errors
    ///
    /// `CooldownActive` or `RateLimited`.
    pub fn ensure_allowed(&self, now: DateTime<Utc>, policy: &RebalancePolicy) -> Result<(), VaultError> {
        match self.blocker(now, policy) {
            Some(SkipReason::Cooldown { remaining_secs }) => {
                Err(crate::error::StateViolation::CooldownActive { remaining_secs }.into())
            }
            Some(SkipReason::RateLimited { executed, max }) => {
                Err(crate::error::StateViolation::RateLimited { executed, max }.into())
            }
            _ => Ok(()),
        }
    }

    fn blocker(&self, now: DateTime<Utc>, policy: &RebalancePolicy) -> Option<SkipReason> {
        if let Some(remaining_secs) = self.cooldown_remaining(now, policy) {
            return Some(SkipReason::Cooldown { remaining_secs });
        }
        let executed = self.executed_in_window(now, policy);
        (executed >= policy.max_per_window).then_some(SkipReason::RateLimited {
            executed,
            max: policy.max_per_window,
        })
    }

    pub(crate) fn record(&mut self, now: DateTime<Utc>, policy: &RebalancePolicy) {
        let window_start = now - Duration::seconds(policy.window_secs);
        while self.executions.front().is_some_and(|t| *t <= window_start) {
            self.executions.pop_front();
        }
        self.executions.push_back(now);
        self.last_rebalance_at = Some(now);
    }
}

/// Why an automatic rebalance did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The previous rebalance is too recent.
    Cooldown {
        /// Seconds until the cooldown ends.
        remaining_secs: i64,
    },
    /// The rolling window is full.
    RateLimited {
        /// Rebalances in the current window.
        executed: usize,
        /// Configured maximum.
        max: usize,
    },
    /// No active domain with a fresh report.
    NoCandidate,
    /// There is neither a weaker holder nor buffer surplus to move.
    NothingToMove,
    /// The best domain does not beat the source by enough.
    BelowThreshold {
        /// Best candidate.
        best: DomainId,
        /// Source domain, `None` for the idle buffer.
        source: Option<DomainId>,
        /// Observed APY advantage.
        differential_bps: u32,
        /// Required advantage.
        required_bps: u32,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cooldown { remaining_secs } => write!(f, "cooldown active ({remaining_secs}s left)"),
            Self::RateLimited { executed, max } => write!(f, "rate limited ({executed}/{max})"),
            Self::NoCandidate => write!(f, "no eligible domain"),
            Self::NothingToMove => write!(f, "nothing to move"),
            Self::BelowThreshold {
                differential_bps,
                required_bps,
                ..
            } => write!(f, "differential {differential_bps} bps not above {required_bps} bps"),
        }
    }
}

/// Capital moved from one domain to another by instruction message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reallocation {
    /// Weakest holder.
    pub from: DomainId,
    /// Its reported APY.
    pub from_apy_bps: u32,
    /// Its whole deployed amount.
    pub amount: u128,
}

/// What a triggered rebalance will do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    /// Best domain receiving capital.
    pub target: DomainId,
    /// Its reported APY.
    pub target_apy_bps: u32,
    /// Capital pulled from the weakest holder.
    pub reallocation: Option<Reallocation>,
    /// Idle surplus deployed from the buffer.
    pub buffer_deployment: u128,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RebalanceDecision {
    /// Move capital.
    Execute(RebalancePlan),
    /// Do nothing.
    Skip(SkipReason),
}

/// Domains eligible at `now`: active and not stale.
pub fn candidates<'a>(
    registry: &'a DomainRegistry,
    policy: &'a RebalancePolicy,
    now: DateTime<Utc>,
) -> impl Iterator<Item = &'a DomainRecord> + 'a {
    let staleness = policy.staleness();
    registry.active().filter(move |r| !r.is_stale(now, staleness))
}

/// Applies the decision rule.
///
/// Ties on APY go to the lower domain id for the best candidate and to the
/// larger holding for the weakest source.
#[must_use]
pub fn decide(
    registry: &DomainRegistry,
    surplus: u128,
    history: &RebalanceHistory,
    policy: &RebalancePolicy,
    now: DateTime<Utc>,
) -> RebalanceDecision {
    if let Some(reason) = history.blocker(now, policy) {
        return RebalanceDecision::Skip(reason);
    }

    let eligible: Vec<&DomainRecord> = candidates(registry, policy, now).collect();
    let best = eligible.iter().copied().fold(None::<&DomainRecord>, |acc, r| match acc {
        Some(b) if b.reported_apy_bps >= r.reported_apy_bps => Some(b),
        _ => Some(r),
    });
    let Some(best) = best else {
        return RebalanceDecision::Skip(SkipReason::NoCandidate);
    };

    let weakest = eligible
        .iter()
        .copied()
        .filter(|r| r.domain_id != best.domain_id && r.deployed_amount > 0)
        .fold(None::<&DomainRecord>, |acc, r| match acc {
            Some(w)
                if w.reported_apy_bps < r.reported_apy_bps
                    || (w.reported_apy_bps == r.reported_apy_bps
                        && w.deployed_amount >= r.deployed_amount) =>
            {
                Some(w)
            }
            _ => Some(r),
        });

    let (source, source_apy) = match weakest {
        Some(w) => (Some(w.domain_id), w.reported_apy_bps),
        None if surplus > 0 => (None, 0),
        None => return RebalanceDecision::Skip(SkipReason::NothingToMove),
    };

    let differential_bps = best.reported_apy_bps.saturating_sub(source_apy);
    if differential_bps <= policy.min_apy_diff_bps {
        return RebalanceDecision::Skip(SkipReason::BelowThreshold {
            best: best.domain_id,
            source,
            differential_bps,
            required_bps: policy.min_apy_diff_bps,
        });
    }

    RebalanceDecision::Execute(RebalancePlan {
        target: best.domain_id,
        target_apy_bps: best.reported_apy_bps,
        reallocation: weakest.map(|w| Reallocation {
            from: w.domain_id,
            from_apy_bps: w.reported_apy_bps,
            amount: w.deployed_amount,
        }),
        buffer_deployment: surplus,
    })
}
