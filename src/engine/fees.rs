//! Time-based management fee accrual.
//!
//! The fee is charged by minting shares to the fee recipient, which dilutes
//! every other holder by exactly the accrued amount without moving any
//! assets out of the buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shares::{Rounding, mul_div};
use crate::error::VaultError;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u128 = 31_536_000;

/// Basis-point denominator.
pub const BPS: u128 = 10_000;

/// A fee-rate change waiting out its time lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFeeUpdate {
    /// Proposed annual rate in basis points.
    pub proposed_rate_bps: u32,
    /// Proposal timestamp.
    pub proposed_at: DateTime<Utc>,
    /// Whether the proposal has been applied.
    pub executed: bool,
}

/// Fee parameters and accrual bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeState {
    /// Current annual management rate in basis points.
    pub rate_bps: u32,
    /// Last time fees were collected (genesis until the first collection).
    pub last_collected_at: Option<DateTime<Utc>>,
    /// Latest proposal, if any.
    pub pending: Option<PendingFeeUpdate>,
    /// Cumulative fee assets charged since genesis.
    pub total_collected: u128,
}

impl FeeState {
    /// Creates fee state at `rate_bps` with no accrual anchor yet.
    #[must_use]
    pub fn new(rate_bps: u32) -> Self {
        Self {
            rate_bps,
            last_collected_at: None,
            pending: None,
            total_collected: 0,
        }
    }

    /// Returns the live (unexecuted) proposal.
    #[must_use]
    pub fn open_proposal(&self) -> Option<&PendingFeeUpdate> {
        self.pending.as_ref().filter(|p| !p.executed)
    }
}

/// Fee accrued on `total_assets` over `elapsed_secs`.
///
/// The applied rate is `min(rate_bps, max_rate_bps)` and the result never
/// exceeds `total_assets × max_rate_bps / 10_000`.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow.
pub fn accrued_fee(
    total_assets: u128,
    rate_bps: u32,
    max_rate_bps: u32,
    elapsed_secs: u128,
) -> Result<u128, VaultError> {
    if elapsed_secs == 0 || rate_bps == 0 || total_assets == 0 {
        return Ok(0);
    }
    let rate = u128::from(rate_bps.min(max_rate_bps));
    let per_year = mul_div(total_assets, rate, BPS, Rounding::Down)?;
    let fee = mul_div(per_year, elapsed_secs, SECONDS_PER_YEAR, Rounding::Down)?;
    let ceiling = mul_div(total_assets, u128::from(max_rate_bps), BPS, Rounding::Down)?;
    Ok(fee.min(ceiling))
}

/// Shares to mint so that the recipient owns exactly `fee` of the pool.
///
/// Solves `s / (supply + s) = fee / total_assets`.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow.
pub fn fee_shares(fee: u128, total_assets: u128, total_supply: u128) -> Result<u128, VaultError> {
    if fee == 0 {
        return Ok(0);
    }
    let remaining = total_assets
        .checked_sub(fee)
        .filter(|r| *r > 0)
        .ok_or(VaultError::ArithmeticOverflow)?;
    mul_div(fee, total_supply, remaining, Rounding::Down)
}
