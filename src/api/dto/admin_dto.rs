//! Rebalancing, fee and administration DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::{RebalanceDecision, RebalanceOutcome, RebalancePlan};

/// Request body for `POST /rebalance/manual`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualRebalanceRequest {
    /// Source domain.
    pub from: u32,
    /// Destination domain.
    pub to: u32,
    /// Amount to move (string-encoded u128).
    pub amount: String,
}

/// A rebalance plan with string-encoded amounts.
#[derive(Debug, Serialize, ToSchema)]
pub struct RebalancePlanDto {
    /// Domain receiving capital.
    pub target: u32,
    /// Target APY at decision time.
    pub target_apy_bps: u32,
    /// Domain capital is pulled from, if any.
    pub source: Option<u32>,
    /// Source APY at decision time.
    pub source_apy_bps: Option<u32>,
    /// Capital moved between domains.
    pub reallocated: String,
    /// Buffer surplus sent to the target.
    pub buffer_deployment: String,
}

impl From<&RebalancePlan> for RebalancePlanDto {
    fn from(plan: &RebalancePlan) -> Self {
        Self {
            target: plan.target.get(),
            target_apy_bps: plan.target_apy_bps,
            source: plan.reallocation.as_ref().map(|r| r.from.get()),
            source_apy_bps: plan.reallocation.as_ref().map(|r| r.from_apy_bps),
            reallocated: plan
                .reallocation
                .as_ref()
                .map_or(0, |r| r.amount)
                .to_string(),
            buffer_deployment: plan.buffer_deployment.to_string(),
        }
    }
}

/// Result of a rebalance or its preview.
#[derive(Debug, Serialize, ToSchema)]
pub struct RebalanceResponse {
    /// `executed`, `would_execute` or `skipped`.
    pub status: String,
    /// Plan executed or proposed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<RebalancePlanDto>,
    /// Why nothing moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&RebalanceOutcome> for RebalanceResponse {
    fn from(outcome: &RebalanceOutcome) -> Self {
        match outcome {
            RebalanceOutcome::Executed(plan) => Self {
                status: "executed".to_string(),
                plan: Some(plan.into()),
                reason: None,
            },
            RebalanceOutcome::Skipped(reason) => Self {
                status: "skipped".to_string(),
                plan: None,
                reason: Some(reason.to_string()),
            },
        }
    }
}

impl From<&RebalanceDecision> for RebalanceResponse {
    fn from(decision: &RebalanceDecision) -> Self {
        match decision {
            RebalanceDecision::Execute(plan) => Self {
                status: "would_execute".to_string(),
                plan: Some(plan.into()),
                reason: None,
            },
            RebalanceDecision::Skip(reason) => Self {
                status: "skipped".to_string(),
                plan: None,
                reason: Some(reason.to_string()),
            },
        }
    }
}

/// Response body for `POST /fees/collect`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeeCollectionResponse {
    /// Fee charged, in assets.
    pub fee_assets: String,
    /// Shares minted to the recipient.
    pub fee_shares: String,
}

/// Request body for `POST /fees/proposal`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FeeProposalRequest {
    /// Proposed annual rate in basis points.
    pub rate_bps: u32,
}

/// Response body for `POST /fees/proposal`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeeProposalResponse {
    /// Proposed rate.
    pub rate_bps: u32,
    /// Earliest execution time.
    pub executable_at: DateTime<Utc>,
}

/// Response body for `POST /fees/proposal/execute`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeeRateResponse {
    /// Rate before the change.
    pub old_rate_bps: u32,
    /// Rate now in force.
    pub new_rate_bps: u32,
}

/// Request body for role grants and revocations.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    /// Account to change.
    pub account: String,
    /// `admin`, `manager`, `rebalancer` or `pauser`.
    pub role: String,
}

/// Rebalancer policy override.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RebalancePolicyDto {
    /// Minimum APY edge that triggers a move.
    pub min_apy_diff_bps: u32,
    /// Minimum seconds between rebalances.
    pub cooldown_secs: i64,
    /// Sliding window for the rate limit.
    pub window_secs: i64,
    /// Rebalances allowed per window.
    pub max_per_window: usize,
    /// Reports older than this are ignored.
    pub staleness_secs: i64,
}

/// Request body for `PUT /admin/params`. Fields are applied one by one in
/// declaration order; the first rejection stops the update and leaves
/// earlier fields applied.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ParamsUpdateRequest {
    /// New deposit cap (string-encoded u128).
    #[serde(default)]
    pub deposit_cap: Option<String>,
    /// New reserve ratio.
    #[serde(default)]
    pub buffer_bps: Option<u32>,
    /// Enable or disable reserve enforcement.
    #[serde(default)]
    pub buffer_management_enabled: Option<bool>,
    /// New fee recipient.
    #[serde(default)]
    pub fee_recipient: Option<String>,
    /// New rebalancer policy.
    #[serde(default)]
    pub rebalance: Option<RebalancePolicyDto>,
}
