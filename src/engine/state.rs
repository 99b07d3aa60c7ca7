//! Serializable ledger state and its configuration.
//!
//! [`LedgerState`] is everything the vault must remember between operations.
//! It is `Clone` so [`super::Ledger`] can checkpoint it, and serde-ready so
//! it can be snapshotted to storage and restored on startup.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::access::AccessControl;
use super::fees::{BPS, FeeState};
use super::rebalancer::{MAX_POLICY_SECS, RebalanceHistory, RebalancePolicy};
use super::shares::{Rounding, ShareLedger, mul_div};
use crate::domain::{Address, DomainId, DomainRegistry};
use crate::error::{PolicyViolation, VaultError};

/// Hard ceiling on any management fee ceiling: 10% per year.
pub const ABSOLUTE_MAX_FEE_BPS: u32 = 1_000;

/// Engine policy knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerParams {
    /// The vault's own address: spender for deposits, recipient of recalls.
    pub vault_address: Address,
    /// Upper bound on total assets.
    pub deposit_cap: u128,
    /// Assets pulled at genesis and locked as seed shares.
    pub seed_amount: u128,
    /// Reserve the idle buffer keeps, in bps of total assets.
    pub buffer_bps: u32,
    /// When disabled, withdrawals may drain the buffer to zero.
    pub buffer_management_enabled: bool,
    /// Initial annual management fee.
    pub management_fee_bps: u32,
    /// Ceiling on the management fee.
    pub max_management_fee_bps: u32,
    /// Delay between proposing and executing a fee change.
    pub fee_timelock_secs: i64,
    /// Receives fee shares.
    pub fee_recipient: Address,
    /// Rebalancer thresholds.
    pub rebalance: RebalancePolicy,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            vault_address: Address::repeat_byte(0xaa),
            deposit_cap: 10_000_000_000_000,
            seed_amount: 1_000_000,
            buffer_bps: 1_000,
            buffer_management_enabled: true,
            management_fee_bps: 100,
            max_management_fee_bps: 500,
            fee_timelock_secs: 172_800,
            fee_recipient: Address::repeat_byte(0xfe),
            rebalance: RebalancePolicy::default(),
        }
    }
}

impl LedgerParams {
    /// Validates every field.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyViolation::InvalidParameter`] naming the first bad
    /// field.
    pub fn validate(&self) -> Result<(), VaultError> {
        let invalid = |name: &'static str, reason: String| -> VaultError {
            PolicyViolation::InvalidParameter { name, reason }.into()
        };
        if self.vault_address.is_zero() {
            return Err(invalid("vault_address", "must not be zero".into()));
        }
        if self.fee_recipient.is_zero() || self.fee_recipient == Address::SEED_SINK {
            return Err(invalid("fee_recipient", "must be a real account".into()));
        }
        if self.seed_amount == 0 {
            return Err(invalid("seed_amount", "must be positive".into()));
        }
        if self.deposit_cap < self.seed_amount {
            return Err(invalid(
                "deposit_cap",
                format!("{} is below the seed amount {}", self.deposit_cap, self.seed_amount),
            ));
        }
        if u128::from(self.buffer_bps) >= BPS {
            return Err(invalid("buffer_bps", format!("{} must be below 10000", self.buffer_bps)));
        }
        if self.max_management_fee_bps > ABSOLUTE_MAX_FEE_BPS {
            return Err(invalid(
                "max_management_fee_bps",
                format!("{} exceeds {ABSOLUTE_MAX_FEE_BPS}", self.max_management_fee_bps),
            ));
        }
        if self.management_fee_bps > self.max_management_fee_bps {
            return Err(invalid(
                "management_fee_bps",
                format!(
                    "{} exceeds ceiling {}",
                    self.management_fee_bps, self.max_management_fee_bps
                ),
            ));
        }
        if !(0..=MAX_POLICY_SECS).contains(&self.fee_timelock_secs) {
            return Err(invalid("fee_timelock_secs", "must be between 0 and ten years".into()));
        }
        self.rebalance.validate()
    }
}

/// Ledger lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Genesis has not run.
    Uninitialized,
    /// Normal operation.
    Active,
    /// Frozen by an emergency pause.
    Paused,
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Compensating withdrawal awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecall {
    /// Correlation id.
    pub recall_id: u64,
    /// Domain asked to return capital.
    pub domain_id: DomainId,
    /// Amount requested.
    pub amount: u128,
    /// Request timestamp.
    pub requested_at: DateTime<Utc>,
}

/// Everything the ledger persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Policy knobs.
    pub params: LedgerParams,
    /// Lifecycle.
    pub status: LedgerStatus,
    /// Share balances.
    pub shares: ShareLedger,
    /// Idle stablecoin held by the vault.
    pub idle_buffer: u128,
    /// Independently tracked sum of deployed capital.
    pub total_deployed: u128,
    /// Remote domains.
    pub registry: DomainRegistry,
    /// Role assignments.
    pub access: AccessControl,
    /// Fee accrual state.
    pub fees: FeeState,
    /// Executed rebalance timestamps.
    pub history: RebalanceHistory,
    /// Recalls awaiting settlement, by id.
    pub pending_recalls: BTreeMap<u64, PendingRecall>,
    /// Next recall id to hand out.
    pub next_recall_id: u64,
}

impl LedgerState {
    /// Fresh, uninitialized state.
    #[must_use]
    pub fn new(params: LedgerParams) -> Self {
        let fees = FeeState::new(params.management_fee_bps);
        Self {
            params,
            status: LedgerStatus::Uninitialized,
            shares: ShareLedger::new(),
            idle_buffer: 0,
            total_deployed: 0,
            registry: DomainRegistry::new(),
            access: AccessControl::new(),
            fees,
            history: RebalanceHistory::default(),
            pending_recalls: BTreeMap::new(),
            next_recall_id: 1,
        }
    }

    /// Idle buffer plus deployed capital.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] on overflow.
    pub fn total_assets(&self) -> Result<u128, VaultError> {
        self.idle_buffer
            .checked_add(self.total_deployed)
            .ok_or(VaultError::ArithmeticOverflow)
    }

    /// `buffer_bps × total_assets / 10_000`, rounded up.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] on overflow.
    pub fn required_buffer(&self) -> Result<u128, VaultError> {
        mul_div(
            self.total_assets()?,
            u128::from(self.params.buffer_bps),
            BPS,
            Rounding::Up,
        )
    }

    /// Buffer above the reserve, available for deployment.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] on overflow.
    pub fn deployable_surplus(&self) -> Result<u128, VaultError> {
        Ok(self.idle_buffer.saturating_sub(self.required_buffer()?))
    }

    /// Largest withdrawal the buffer can serve at once.
    ///
    /// With buffer management enabled the post-withdrawal buffer must still
    /// cover the reserve on the post-withdrawal total:
    /// `X ≤ (buffer × 10_000 − bps × total) / (10_000 − bps)`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] on overflow.
    pub fn withdrawable_buffer(&self) -> Result<u128, VaultError> {
        if !self.params.buffer_management_enabled {
            return Ok(self.idle_buffer);
        }
        let bps = u128::from(self.params.buffer_bps);
        let scaled_buffer = self
            .idle_buffer
            .checked_mul(BPS)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let reserve = self
            .total_assets()?
            .checked_mul(bps)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let Some(headroom) = scaled_buffer.checked_sub(reserve) else {
            return Ok(0);
        };
        let divisor = BPS.saturating_sub(bps);
        Ok(mul_div(headroom, 1, divisor, Rounding::Down)?.min(self.idle_buffer))
    }

    /// Checks the accounting identities.
    ///
    /// Returns every violated identity as a message; empty means sound.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        match self.registry.total_deployed() {
            Ok(sum) if sum != self.total_deployed => violations.push(format!(
                "sum of deployed amounts {sum} differs from tracked total {}",
                self.total_deployed
            )),
            Ok(_) => {}
            Err(e) => violations.push(format!("deployed amounts overflow: {e}")),
        }
        if self.total_assets().is_err() {
            violations.push("total assets overflow".to_string());
        }
        if self.status != LedgerStatus::Uninitialized {
            let seed = self.shares.seed();
            let sink = self.shares.balance_of(Address::SEED_SINK);
            if seed == 0 || sink != seed {
                violations.push(format!("seed balance {sink} differs from locked seed {seed}"));
            }
        }
        let sum = self.shares.sum_of_balances();
        if sum != self.shares.total_supply() {
            violations.push(format!(
                "sum of share balances {sum} differs from supply {}",
                self.shares.total_supply()
            ));
        }
        violations
    }
}
