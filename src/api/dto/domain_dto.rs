//! Domain registry, capital movement and message DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DomainRecord;
use crate::engine::PendingRecall;

/// Request body for `POST /domains`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterDomainRequest {
    /// Remote domain identifier.
    pub domain_id: u32,
    /// Child vault address inside the domain.
    pub vault_address: String,
}

/// One registered domain.
#[derive(Debug, Serialize, ToSchema)]
pub struct DomainDto {
    /// Domain identifier.
    pub domain_id: u32,
    /// Child vault address.
    pub vault_address: String,
    /// Capital recorded as deployed (string-encoded u128).
    pub deployed_amount: String,
    /// Last reported APY in basis points.
    pub reported_apy_bps: u32,
    /// Timestamp of the last applied report.
    pub last_report_time: Option<DateTime<Utc>>,
    /// `active` or `inactive`.
    pub status: String,
    /// First registration time.
    pub registered_at: DateTime<Utc>,
    /// `true` when the last report is older than the staleness window.
    pub stale: bool,
}

impl DomainDto {
    /// Renders `record` as seen at `now`.
    #[must_use]
    pub fn from_record(record: &DomainRecord, now: DateTime<Utc>, staleness: chrono::Duration) -> Self {
        Self {
            domain_id: record.domain_id.get(),
            vault_address: record.vault_address.to_string(),
            deployed_amount: record.deployed_amount.to_string(),
            reported_apy_bps: record.reported_apy_bps,
            last_report_time: record.last_report_time,
            status: record.status.to_string(),
            registered_at: record.registered_at,
            stale: record.is_stale(now, staleness),
        }
    }
}

/// Response body for `GET /domains`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DomainListResponse {
    /// Domains ordered by id.
    pub data: Vec<DomainDto>,
}

/// Response body for `POST /domains/{id}/deploy`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeployResponse {
    /// Bridge transfer identifier.
    pub transfer_id: uuid::Uuid,
    /// Destination domain.
    pub domain_id: u32,
    /// Amount dispatched.
    pub amount: String,
}

/// Response body for `POST /domains/{id}/recall`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecallResponse {
    /// Correlation id the child vault echoes on settlement.
    pub recall_id: u64,
    /// Source domain.
    pub domain_id: u32,
    /// Amount requested.
    pub amount: String,
}

/// Request body for `POST /domains/{id}/report`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportYieldRequest {
    /// Annualized yield in basis points.
    pub apy_bps: u32,
    /// Capital currently deployed in the domain (string-encoded u128).
    pub deployed_amount: String,
}

/// What an inbound message or manual report did.
#[derive(Debug, Serialize, ToSchema)]
pub struct InboundResponse {
    /// Outcome discriminator, e.g. `report_applied`.
    pub outcome: String,
    /// Domain the message concerned.
    pub domain_id: u32,
}

/// One recall awaiting settlement.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingRecallDto {
    /// Correlation id.
    pub recall_id: u64,
    /// Source domain.
    pub domain_id: u32,
    /// Amount requested.
    pub amount: String,
    /// Request time.
    pub requested_at: DateTime<Utc>,
}

impl From<&PendingRecall> for PendingRecallDto {
    fn from(recall: &PendingRecall) -> Self {
        Self {
            recall_id: recall.recall_id,
            domain_id: recall.domain_id.get(),
            amount: recall.amount.to_string(),
            requested_at: recall.requested_at,
        }
    }
}

/// Request body for `POST /messages/inbound`, as relayed by the messaging
/// infrastructure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InboundMessageRequest {
    /// Domain the message claims to come from.
    pub origin: u32,
    /// Address the message claims to be sent by.
    pub sender: String,
    /// Hex-encoded payload, `0x` prefix optional.
    pub payload: String,
}

/// One dispatched outbound message.
#[derive(Debug, Serialize, ToSchema)]
pub struct OutboundMessageDto {
    /// Channel-assigned identifier.
    pub message_id: String,
    /// Destination domain.
    pub destination: u32,
    /// Decoded message kind, or `undecodable`.
    pub kind: String,
    /// Hex-encoded payload.
    pub payload: String,
    /// Fee quoted at dispatch.
    pub fee: String,
    /// Dispatch time.
    pub sent_at: DateTime<Utc>,
}

/// One dispatched bridge transfer.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransferDto {
    /// Bridge transfer identifier.
    pub transfer_id: uuid::Uuid,
    /// Destination domain.
    pub destination: u32,
    /// Recipient inside the destination.
    pub recipient: String,
    /// Amount dispatched.
    pub amount: String,
    /// Domains traversed, ending with the destination.
    pub hops: Vec<u32>,
    /// Dispatch time.
    pub dispatched_at: DateTime<Utc>,
}
