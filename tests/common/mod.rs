//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use meridian_vault::channel::Stablecoin;
use meridian_vault::domain::{Address, DomainId};
use meridian_vault::engine::{Ledger, LedgerParams, Role};
use meridian_vault::service::LocalChannels;

pub const ADMIN: Address = Address::repeat_byte(0xad);
pub const KEEPER: Address = Address::repeat_byte(0xbe);
pub const ALICE: Address = Address::repeat_byte(0x01);
pub const BOB: Address = Address::repeat_byte(0x02);

pub const D1: DomainId = DomainId::new(10);
pub const D2: DomainId = DomainId::new(42161);
pub const D1_VAULT: Address = Address::repeat_byte(0xd1);
pub const D2_VAULT: Address = Address::repeat_byte(0xd2);

/// Fixed start time so tests are reproducible.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// An initialized ledger wired to in-memory channels.
pub struct Harness {
    pub ledger: Ledger,
    pub channels: LocalChannels,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_params(LedgerParams::default())
    }

    /// Genesis at [`t0`]; KEEPER holds Manager, Rebalancer and Pauser.
    pub fn with_params(params: LedgerParams) -> Self {
        let channels = LocalChannels::default();
        let vault = params.vault_address;
        let seed = params.seed_amount;
        let Ok(mut ledger) = Ledger::new(params, channels.ports()) else {
            panic!("params should be valid");
        };
        channels.stablecoin.mint(ADMIN, seed);
        let Ok(()) = channels.stablecoin.approve(ADMIN, vault, seed) else {
            panic!("approve");
        };
        let Ok(()) = ledger.initialize(ADMIN, t0()) else {
            panic!("initialize");
        };
        for role in [Role::Manager, Role::Rebalancer, Role::Pauser] {
            let Ok(_) = ledger.grant_role(ADMIN, KEEPER, role) else {
                panic!("grant {role}");
            };
        }
        ledger.take_events();
        Self { ledger, channels }
    }

    pub fn vault(&self) -> Address {
        self.ledger.params().vault_address
    }

    /// Mints `amount` tokens to `who` and approves the vault for them.
    pub fn fund(&self, who: Address, amount: u128) {
        self.channels.stablecoin.mint(who, amount);
        let allowance = self.channels.stablecoin.allowance(who, self.vault());
        let Ok(()) = self
            .channels
            .stablecoin
            .approve(who, self.vault(), allowance.saturating_add(amount))
        else {
            panic!("approve");
        };
    }

    pub fn deposit(&mut self, who: Address, amount: u128, now: DateTime<Utc>) -> u128 {
        self.fund(who, amount);
        let Ok(shares) = self.ledger.deposit(who, amount, who, now) else {
            panic!("deposit of {amount} should succeed");
        };
        shares
    }

    /// Registers D1 and D2 at `now`.
    pub fn register_domains(&mut self, now: DateTime<Utc>) {
        for (id, vault) in [(D1, D1_VAULT), (D2, D2_VAULT)] {
            let Ok(()) = self.ledger.add_child_vault(ADMIN, id, vault, now) else {
                panic!("register {id}");
            };
        }
    }

    pub fn report(&mut self, id: DomainId, apy_bps: u32, deployed: u128, now: DateTime<Utc>) {
        let Ok(_) = self.ledger.report_yield(KEEPER, id, apy_bps, deployed, now) else {
            panic!("report for {id}");
        };
    }
}
