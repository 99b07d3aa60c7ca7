//! Wire codec for cross-domain payloads.
//!
//! Payloads are `bincode` with fixed-width integers. Trailing bytes and
//! oversized inputs are rejected so that a payload decodes to exactly one
//! message or fails.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TransferId;
use crate::domain::{Address, DomainId};
use crate::error::MalformedInput;

/// Upper bound on an encoded payload.
pub const MAX_PAYLOAD_BYTES: u64 = 1024;

/// Every message exchanged between the vault and its child vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDomainMessage {
    /// Inbound: periodic yield report from a child vault.
    YieldReport {
        /// Reporting domain.
        domain_id: DomainId,
        /// Annualized yield in basis points.
        apy_bps: u32,
        /// Capital currently deployed in the domain.
        deployed_amount: u128,
        /// Unix timestamp (seconds) at which the report was produced.
        reported_at: i64,
    },

    /// Inbound: a recall was executed and its funds have reached the vault.
    RecallSettled {
        /// Domain the funds came from.
        domain_id: DomainId,
        /// Recall being settled.
        recall_id: u64,
        /// Amount returned.
        amount: u128,
    },

    /// Inbound: the child vault received a deployment.
    DeploymentAcknowledged {
        /// Receiving domain.
        domain_id: DomainId,
        /// Transfer that arrived.
        transfer_id: TransferId,
        /// Amount received.
        amount: u128,
    },

    /// Outbound: a transfer is on its way to the child vault.
    DeploymentNotice {
        /// Transfer dispatched through the asset channel.
        transfer_id: TransferId,
        /// Amount dispatched.
        amount: u128,
    },

    /// Outbound: move capital from the receiving domain to another domain.
    ReallocationInstruction {
        /// Destination domain.
        destination: DomainId,
        /// Child vault address in the destination.
        recipient: Address,
        /// Amount to move.
        amount: u128,
    },

    /// Outbound: send capital back to the vault.
    RecallRequest {
        /// Correlation id echoed by [`CrossDomainMessage::RecallSettled`].
        recall_id: u64,
        /// Amount to return.
        amount: u128,
        /// Vault address to return funds to.
        recipient: Address,
    },
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PAYLOAD_BYTES)
        .reject_trailing_bytes()
}

impl CrossDomainMessage {
    /// Builds a yield report stamped with `reported_at`.
    #[must_use]
    pub fn yield_report(
        domain_id: DomainId,
        apy_bps: u32,
        deployed_amount: u128,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self::YieldReport {
            domain_id,
            apy_bps,
            deployed_amount,
            reported_at: reported_at.timestamp(),
        }
    }

    /// Encodes the message.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput::UndecodablePayload`] if the message exceeds
    /// [`MAX_PAYLOAD_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>, MalformedInput> {
        codec()
            .serialize(self)
            .map_err(|e| MalformedInput::UndecodablePayload(e.to_string()))
    }

    /// Decodes exactly one message from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput::UndecodablePayload`] on truncated input,
    /// unknown discriminants, trailing bytes or oversized input.
    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedInput> {
        if bytes.is_empty() {
            return Err(MalformedInput::UndecodablePayload("empty payload".into()));
        }
        codec()
            .deserialize(bytes)
            .map_err(|e| MalformedInput::UndecodablePayload(e.to_string()))
    }

    /// Short name of the message kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::YieldReport { .. } => "yield_report",
            Self::RecallSettled { .. } => "recall_settled",
            Self::DeploymentAcknowledged { .. } => "deployment_acknowledged",
            Self::DeploymentNotice { .. } => "deployment_notice",
            Self::ReallocationInstruction { .. } => "reallocation_instruction",
            Self::RecallRequest { .. } => "recall_request",
        }
    }

    /// Domain named in an inbound payload; `None` for outbound kinds.
    #[must_use]
    pub const fn inbound_domain(&self) -> Option<DomainId> {
        match self {
            Self::YieldReport { domain_id, .. }
            | Self::RecallSettled { domain_id, .. }
            | Self::DeploymentAcknowledged { domain_id, .. } => Some(*domain_id),
            Self::DeploymentNotice { .. }
            | Self::ReallocationInstruction { .. }
            | Self::RecallRequest { .. } => None,
        }
    }
}
