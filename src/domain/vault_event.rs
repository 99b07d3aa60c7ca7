//! Domain events reflecting vault state mutations.
//!
//! Every committed ledger operation emits one or more [`VaultEvent`]s. The
//! service publishes them through the [`super::EventBus`] once the operation
//! has committed; they are broadcast to WebSocket subscribers and optionally
//! appended to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Address, DomainId};
use crate::channel::TransferId;
use crate::engine::Role;

/// Domain event emitted after every committed state mutation.
///
/// Amounts are stored as `String` to preserve u128 precision when
/// serialized to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum VaultEvent {
    /// Genesis completed.
    Initialized {
        /// Assets locked as seed.
        seed_amount: String,
        /// Initial admin.
        admin: Address,
        /// Genesis timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Assets deposited and shares minted.
    Deposited {
        /// Account that supplied the assets.
        caller: Address,
        /// Account credited with shares.
        receiver: Address,
        /// Assets pulled (string-encoded u128).
        assets: String,
        /// Shares minted (string-encoded u128).
        shares: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Shares burned and assets released from the buffer.
    Withdrawn {
        /// Account that triggered the withdrawal.
        caller: Address,
        /// Account receiving the assets.
        receiver: Address,
        /// Share owner.
        owner: Address,
        /// Assets released (string-encoded u128).
        assets: String,
        /// Shares burned (string-encoded u128).
        shares: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Shares moved between holders.
    SharesTransferred {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Shares moved.
        shares: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A child vault was registered or reactivated.
    DomainRegistered {
        /// Domain identifier.
        domain_id: DomainId,
        /// Child vault address.
        vault_address: Address,
        /// `true` if an inactive record was reactivated.
        reactivated: bool,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A child vault was retired.
    DomainRetired {
        /// Domain identifier.
        domain_id: DomainId,
        /// Capital still recorded as deployed there.
        deployed_amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Buffer capital dispatched to a domain.
    CapitalDeployed {
        /// Destination domain.
        domain_id: DomainId,
        /// Amount dispatched.
        amount: String,
        /// Transfer channel identifier.
        transfer_id: TransferId,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Deployed capital instructed to move between domains.
    CapitalReallocated {
        /// Source domain.
        from: DomainId,
        /// Destination domain.
        to: DomainId,
        /// Amount moved.
        amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A rebalance executed.
    Rebalanced {
        /// Domain receiving capital.
        target: DomainId,
        /// Domain giving up capital, if any.
        source: Option<DomainId>,
        /// Amount reallocated between domains.
        reallocated: String,
        /// Amount deployed from the idle buffer.
        deployed_from_buffer: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A recall was requested.
    RecallRequested {
        /// Domain asked to return capital.
        domain_id: DomainId,
        /// Correlation id.
        recall_id: u64,
        /// Amount requested.
        amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Recalled capital arrived in the buffer.
    RecallSettled {
        /// Source domain.
        domain_id: DomainId,
        /// Correlation id.
        recall_id: u64,
        /// Amount credited.
        amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A child vault confirmed receipt of a deployment.
    DeploymentAcknowledged {
        /// Receiving domain.
        domain_id: DomainId,
        /// Transfer being acknowledged.
        transfer_id: TransferId,
        /// Amount received.
        amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A yield report overwrote a domain record.
    YieldReported {
        /// Reporting domain.
        domain_id: DomainId,
        /// Reported APY in basis points.
        apy_bps: u32,
        /// Deployed amount after the report.
        deployed_amount: String,
        /// Deployed amount before the report.
        previous_deployed: String,
        /// Timestamp carried by the report.
        reported_at: DateTime<Utc>,
    },

    /// A yield report lowered the deployed amount.
    LossRealized {
        /// Reporting domain.
        domain_id: DomainId,
        /// Amount lost.
        amount: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Management fees minted to the fee recipient.
    FeesCollected {
        /// Fee in asset terms.
        fee_assets: String,
        /// Shares minted.
        fee_shares: String,
        /// Share recipient.
        recipient: Address,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A fee-rate change was proposed.
    FeeRateProposed {
        /// Proposed rate.
        rate_bps: u32,
        /// Earliest execution time.
        executable_at: DateTime<Utc>,
    },

    /// A fee-rate change took effect.
    FeeRateUpdated {
        /// Previous rate.
        old_rate_bps: u32,
        /// New rate.
        new_rate_bps: u32,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A pending fee-rate change was dropped.
    FeeRateCancelled {
        /// Rate that will not apply.
        rate_bps: u32,
    },

    /// Emergency pause engaged.
    Paused {
        /// Account that paused.
        by: Address,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emergency pause lifted.
    Unpaused {
        /// Account that unpaused.
        by: Address,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A role was granted.
    RoleGranted {
        /// Grantee.
        account: Address,
        /// Role.
        role: Role,
    },

    /// A role was revoked.
    RoleRevoked {
        /// Former holder.
        account: Address,
        /// Role.
        role: Role,
    },

    /// An admin setter changed a policy parameter.
    ParameterUpdated {
        /// Parameter name.
        name: String,
        /// New value, rendered as text.
        value: String,
    },

    /// An inbound message was refused. Published by the service, never
    /// part of a committed operation.
    MessageRejected {
        /// Claimed origin.
        origin: DomainId,
        /// Claimed sender.
        sender: Address,
        /// Rejection reason.
        reason: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl VaultEvent {
    /// Domain the event concerns; `None` for vault-level events.
    #[must_use]
    pub const fn domain_id(&self) -> Option<DomainId> {
        match self {
            Self::DomainRegistered { domain_id, .. }
            | Self::DomainRetired { domain_id, .. }
            | Self::CapitalDeployed { domain_id, .. }
            | Self::RecallRequested { domain_id, .. }
            | Self::RecallSettled { domain_id, .. }
            | Self::DeploymentAcknowledged { domain_id, .. }
            | Self::YieldReported { domain_id, .. }
            | Self::LossRealized { domain_id, .. }
            | Self::MessageRejected {
                origin: domain_id, ..
            } => Some(*domain_id),
            Self::CapitalReallocated { to, .. } => Some(*to),
            Self::Rebalanced { target, .. } => Some(*target),
            Self::Initialized { .. }
            | Self::Deposited { .. }
            | Self::Withdrawn { .. }
            | Self::SharesTransferred { .. }
            | Self::FeesCollected { .. }
            | Self::FeeRateProposed { .. }
            | Self::FeeRateUpdated { .. }
            | Self::FeeRateCancelled { .. }
            | Self::Paused { .. }
            | Self::Unpaused { .. }
            | Self::RoleGranted { .. }
            | Self::RoleRevoked { .. }
            | Self::ParameterUpdated { .. } => None,
        }
    }

    /// Every domain the event concerns. Reallocations touch two.
    #[must_use]
    pub fn domains(&self) -> Vec<DomainId> {
        match self {
            Self::CapitalReallocated { from, to, .. } => vec![*from, *to],
            Self::Rebalanced {
                target,
                source: Some(source),
                ..
            } => vec![*source, *target],
            other => other.domain_id().into_iter().collect(),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "initialized",
            Self::Deposited { .. } => "deposited",
            Self::Withdrawn { .. } => "withdrawn",
            Self::SharesTransferred { .. } => "shares_transferred",
            Self::DomainRegistered { .. } => "domain_registered",
            Self::DomainRetired { .. } => "domain_retired",
            Self::CapitalDeployed { .. } => "capital_deployed",
            Self::CapitalReallocated { .. } => "capital_reallocated",
            Self::Rebalanced { .. } => "rebalanced",
            Self::RecallRequested { .. } => "recall_requested",
            Self::RecallSettled { .. } => "recall_settled",
            Self::DeploymentAcknowledged { .. } => "deployment_acknowledged",
            Self::YieldReported { .. } => "yield_reported",
            Self::LossRealized { .. } => "loss_realized",
            Self::FeesCollected { .. } => "fees_collected",
            Self::FeeRateProposed { .. } => "fee_rate_proposed",
            Self::FeeRateUpdated { .. } => "fee_rate_updated",
            Self::FeeRateCancelled { .. } => "fee_rate_cancelled",
            Self::Paused { .. } => "paused",
            Self::Unpaused { .. } => "unpaused",
            Self::RoleGranted { .. } => "role_granted",
            Self::RoleRevoked { .. } => "role_revoked",
            Self::ParameterUpdated { .. } => "parameter_updated",
            Self::MessageRejected { .. } => "message_rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_serializes_with_tag_and_string_amounts() {
        let event = VaultEvent::Deposited {
            caller: Address::repeat_byte(1),
            receiver: Address::repeat_byte(1),
            assets: "1000".to_string(),
            shares: "1000".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"deposited\""));
        assert!(json.contains("\"assets\":\"1000\""));
        assert_eq!(event.domain_id(), None);
    }

    #[test]
    fn reallocation_concerns_both_domains() {
        let event = VaultEvent::CapitalReallocated {
            from: DomainId::new(1),
            to: DomainId::new(2),
            amount: "5".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.domains(), vec![DomainId::new(1), DomainId::new(2)]);
        assert_eq!(event.event_type_str(), "capital_reallocated");
    }

    #[test]
    fn rejection_is_keyed_by_origin() {
        let event = VaultEvent::MessageRejected {
            origin: DomainId::new(10),
            sender: Address::ZERO,
            reason: "bad".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.domain_id(), Some(DomainId::new(10)));
    }
}
