//! Vault-level DTOs: deposits, withdrawals, previews and the overview.
//!
//! Amounts travel as decimal strings; addresses as `0x` hex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for `POST /vault/deposit`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Assets to deposit (string-encoded u128).
    pub assets: String,
    /// Share recipient. Defaults to the caller.
    #[serde(default)]
    pub receiver: Option<String>,
}

/// Request body for `POST /vault/mint`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MintRequest {
    /// Exact shares to mint (string-encoded u128).
    pub shares: String,
    /// Share recipient. Defaults to the caller.
    #[serde(default)]
    pub receiver: Option<String>,
}

/// Request body for `POST /vault/withdraw`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    /// Exact assets to withdraw (string-encoded u128).
    pub assets: String,
    /// Asset recipient. Defaults to the caller.
    #[serde(default)]
    pub receiver: Option<String>,
    /// Share owner. Defaults to the caller.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Request body for `POST /vault/redeem`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRequest {
    /// Shares to burn (string-encoded u128).
    pub shares: String,
    /// Asset recipient. Defaults to the caller.
    #[serde(default)]
    pub receiver: Option<String>,
    /// Share owner. Defaults to the caller.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Request body for `POST /vault/transfer`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferSharesRequest {
    /// Recipient address.
    pub to: String,
    /// Shares to move (string-encoded u128).
    pub shares: String,
}

/// Assets and shares exchanged by a deposit, mint, withdraw or redeem.
#[derive(Debug, Serialize, ToSchema)]
pub struct FlowResponse {
    /// Assets moved (string-encoded u128).
    pub assets: String,
    /// Shares minted or burned (string-encoded u128).
    pub shares: String,
}

/// Open fee proposal.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingFeeDto {
    /// Proposed rate in basis points.
    pub proposed_rate_bps: u32,
    /// Proposal time.
    pub proposed_at: DateTime<Utc>,
    /// Earliest execution time.
    pub executable_at: DateTime<Utc>,
}

/// Response body for `GET /vault`.
#[derive(Debug, Serialize, ToSchema)]
pub struct VaultOverview {
    /// `uninitialized`, `active` or `paused`.
    pub status: String,
    /// Idle buffer plus deployed capital.
    pub total_assets: String,
    /// Outstanding shares, seed included.
    pub total_supply: String,
    /// Assets per share scaled by 1e18.
    pub share_price: String,
    /// Idle stablecoin held by the vault.
    pub idle_buffer: String,
    /// Reserve the buffer must keep.
    pub required_buffer: String,
    /// Largest withdrawal the buffer can honour now.
    pub withdrawable_buffer: String,
    /// Buffer above the reserve.
    pub deployable_surplus: String,
    /// Capital recorded across all domains.
    pub total_deployed: String,
    /// Deposit cap on total assets.
    pub deposit_cap: String,
    /// Reserve ratio in basis points.
    pub buffer_bps: u32,
    /// Whether the reserve is enforced.
    pub buffer_management_enabled: bool,
    /// Current management fee.
    pub management_fee_bps: u32,
    /// Lifetime fees minted, in assets.
    pub fees_collected: String,
    /// Open fee proposal, if any.
    pub pending_fee: Option<PendingFeeDto>,
    /// Registered domains, active or not.
    pub domain_count: usize,
    /// Recalls awaiting settlement.
    pub pending_recalls: usize,
    /// Last executed rebalance.
    pub last_rebalance_at: Option<DateTime<Utc>>,
}

/// Query for `GET /vault/preview`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PreviewQuery {
    /// Assets to price (string-encoded u128).
    #[serde(default)]
    pub assets: Option<String>,
    /// Shares to price (string-encoded u128).
    #[serde(default)]
    pub shares: Option<String>,
}

/// Response body for `GET /vault/preview`. Each field is present only when
/// its input was supplied.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PreviewResponse {
    /// Shares a deposit of `assets` mints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_shares: Option<String>,
    /// Shares a withdrawal of `assets` burns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdraw_shares: Option<String>,
    /// Assets a mint of `shares` costs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_assets: Option<String>,
    /// Assets a redemption of `shares` pays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeem_assets: Option<String>,
}

/// Response body for `GET /accounts/{address}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    /// Account address.
    pub address: String,
    /// Share balance.
    pub shares: String,
    /// Shares valued at the current price.
    pub assets_value: String,
    /// Largest withdrawal allowed now.
    pub max_withdraw: String,
    /// Largest redemption allowed now.
    pub max_redeem: String,
    /// Stablecoin balance.
    pub token_balance: String,
    /// Stablecoin allowance granted to the vault.
    pub vault_allowance: String,
    /// Roles held.
    pub roles: Vec<String>,
}

/// Request body for `POST /faucet`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FaucetRequest {
    /// Account to fund. Defaults to the caller.
    #[serde(default)]
    pub to: Option<String>,
    /// Amount to credit (string-encoded u128).
    pub amount: String,
}
