//! Pool share accounting and share/asset conversion math.
//!
//! Conversions follow the usual tokenized-vault rounding rules: anything
//! paid out to a user rounds down, anything charged to a user rounds up, so
//! rounding dust always stays in the pool.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::Address;
use crate::error::{PolicyViolation, VaultError};

/// Fixed-point scale for [`share_price`].
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Rounding direction for [`mul_div`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero.
    Down,
    /// Away from zero.
    Up,
}

/// Computes `a * b / d` with checked arithmetic.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow or `d == 0`.
pub fn mul_div(a: u128, b: u128, d: u128, rounding: Rounding) -> Result<u128, VaultError> {
    if d == 0 {
        return Err(VaultError::ArithmeticOverflow);
    }
    let product = a.checked_mul(b).ok_or(VaultError::ArithmeticOverflow)?;
    let quotient = product / d;
    if rounding == Rounding::Up && product % d != 0 {
        quotient.checked_add(1).ok_or(VaultError::ArithmeticOverflow)
    } else {
        Ok(quotient)
    }
}

/// Shares corresponding to `assets` at the current exchange rate.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow or an empty pool.
pub fn assets_to_shares(
    assets: u128,
    total_supply: u128,
    total_assets: u128,
    rounding: Rounding,
) -> Result<u128, VaultError> {
    mul_div(assets, total_supply, total_assets, rounding)
}

/// Assets corresponding to `shares` at the current exchange rate.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow or an empty pool.
pub fn shares_to_assets(
    shares: u128,
    total_supply: u128,
    total_assets: u128,
    rounding: Rounding,
) -> Result<u128, VaultError> {
    mul_div(shares, total_assets, total_supply, rounding)
}

/// Assets per share, scaled by [`PRICE_SCALE`].
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] on overflow or zero supply.
pub fn share_price(total_assets: u128, total_supply: u128) -> Result<u128, VaultError> {
    mul_div(total_assets, PRICE_SCALE, total_supply, Rounding::Down)
}

/// Share balances, total supply and the locked genesis seed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLedger {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    seed: u128,
}

impl ShareLedger {
    /// Creates an empty share ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total shares outstanding, seed included.
    #[must_use]
    pub const fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Seed shares locked in [`Address::SEED_SINK`].
    #[must_use]
    pub const fn seed(&self) -> u128 {
        self.seed
    }

    /// Shares held by `holder`.
    #[must_use]
    pub fn balance_of(&self, holder: Address) -> u128 {
        self.balances.get(&holder).copied().unwrap_or(0)
    }

    /// Number of addresses with a non-zero balance.
    #[must_use]
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of every balance. Equal to [`Self::total_supply`] in every
    /// reachable state.
    #[must_use]
    pub fn sum_of_balances(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    /// Mints the genesis seed to the sink.
    pub(crate) fn mint_seed(&mut self, shares: u128) -> Result<(), VaultError> {
        self.mint(Address::SEED_SINK, shares)?;
        self.seed = shares;
        Ok(())
    }

    pub(crate) fn mint(&mut self, to: Address, shares: u128) -> Result<(), VaultError> {
        let supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.total_supply = supply;
        if balance > 0 {
            self.balances.insert(to, balance);
        }
        Ok(())
    }

    pub(crate) fn burn(&mut self, from: Address, shares: u128) -> Result<(), VaultError> {
        if from == Address::SEED_SINK {
            return Err(PolicyViolation::SeedLocked.into());
        }
        let balance = self.balance_of(from);
        let remaining = balance
            .checked_sub(shares)
            .ok_or(PolicyViolation::InsufficientShares {
                requested: shares,
                balance,
            })?;
        self.total_supply = self
            .total_supply
            .checked_sub(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.set_balance(from, remaining);
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        shares: u128,
    ) -> Result<(), VaultError> {
        if from == Address::SEED_SINK {
            return Err(PolicyViolation::SeedLocked.into());
        }
        let balance = self.balance_of(from);
        let remaining = balance
            .checked_sub(shares)
            .ok_or(PolicyViolation::InsufficientShares {
                requested: shares,
                balance,
            })?;
        self.set_balance(from, remaining);
        let credited = self
            .balance_of(to)
            .checked_add(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.set_balance(to, credited);
        Ok(())
    }

    fn set_balance(&mut self, holder: Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }
}
