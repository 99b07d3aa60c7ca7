//! Stablecoin interface consumed at the vault's deposit and withdrawal edges.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::ChannelError;
use crate::domain::Address;

/// Decimal precision of the reference stablecoin.
pub const STABLECOIN_DECIMALS: u8 = 6;

/// Fungible token with transfer/approve/balance semantics.
///
/// `from` is explicit on [`Stablecoin::transfer`] because the vault acts as
/// the sender on its own behalf.
pub trait Stablecoin: Send + Sync + std::fmt::Debug {
    /// Decimal precision.
    fn decimals(&self) -> u8;

    /// Balance held by `who`.
    fn balance_of(&self, who: Address) -> u128;

    /// Remaining amount `spender` may move on behalf of `owner`.
    fn allowance(&self, owner: Address, spender: Address) -> u128;

    /// Sets the allowance of `spender` over `owner`'s tokens.
    ///
    /// # Errors
    ///
    /// Implementations may reject approvals for unknown accounts.
    fn approve(&self, owner: Address, spender: Address, amount: u128) -> Result<(), ChannelError>;

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InsufficientBalance`] if `from` is short.
    fn transfer(&self, from: Address, to: Address, amount: u128) -> Result<(), ChannelError>;

    /// Moves `amount` from `from` to `to` using `spender`'s allowance.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InsufficientAllowance`] or
    /// [`ChannelError::InsufficientBalance`]; nothing moves on error.
    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), ChannelError>;
}

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl TokenBook {
    fn debit(&mut self, holder: Address, amount: u128) -> Result<(), ChannelError> {
        let available = self.balances.get(&holder).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(amount)
            .ok_or(ChannelError::InsufficientBalance {
                holder,
                needed: amount,
                available,
            })?;
        self.balances.insert(holder, remaining);
        Ok(())
    }

    fn credit(&mut self, holder: Address, amount: u128) {
        let balance = self.balances.entry(holder).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}

/// In-process token ledger with a mint for funding test and dev accounts.
#[derive(Debug, Default)]
pub struct InMemoryStablecoin {
    book: Mutex<TokenBook>,
}

impl InMemoryStablecoin {
    /// Creates an empty token ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `to` out of thin air.
    pub fn mint(&self, to: Address, amount: u128) {
        self.book.lock().credit(to, amount);
    }

    /// Total supply across all holders.
    #[must_use]
    pub fn total_supply(&self) -> u128 {
        self.book.lock().balances.values().copied().sum()
    }
}

impl Stablecoin for InMemoryStablecoin {
    fn decimals(&self) -> u8 {
        STABLECOIN_DECIMALS
    }

    fn balance_of(&self, who: Address) -> u128 {
        self.book.lock().balances.get(&who).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.book
            .lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&self, owner: Address, spender: Address, amount: u128) -> Result<(), ChannelError> {
        self.book.lock().allowances.insert((owner, spender), amount);
        Ok(())
    }

    fn transfer(&self, from: Address, to: Address, amount: u128) -> Result<(), ChannelError> {
        let mut book = self.book.lock();
        book.debit(from, amount)?;
        book.credit(to, amount);
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), ChannelError> {
        let mut book = self.book.lock();
        let allowed = book.allowances.get(&(from, spender)).copied().unwrap_or(0);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or(ChannelError::InsufficientAllowance {
                owner: from,
                spender,
                needed: amount,
                available: allowed,
            })?;
        book.debit(from, amount)?;
        book.allowances.insert((from, spender), remaining);
        book.credit(to, amount);
        Ok(())
    }
}
