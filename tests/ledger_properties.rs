//! Property tests for the ledger's accounting identities.
//!
//! Random interleavings of user flows, deployments, recalls, rebalances and
//! delayed or duplicated reports are applied to a fresh ledger. Rejected
//! operations are fine, but no sequence may break the identities that hold
//! between operations.

#![allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use common::*;
use meridian_vault::channel::CrossDomainMessage;
use meridian_vault::domain::{Address, DomainId, VaultEvent};
use meridian_vault::engine::{LedgerParams, RebalancePolicy};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, u128),
    Mint(usize, u128),
    Withdraw(usize, u128),
    Redeem(usize, u128),
    Transfer(usize, u128),
    Deploy(usize, u128),
    CollectFees,
    /// Keeper report: APY and a per-mille factor on the recorded balance.
    Report(usize, u32, u128),
    /// Child-vault report dated `age` seconds in the past.
    Inbound(usize, u32, u128, i64),
    /// Re-delivers an earlier inbound payload.
    Replay(usize),
    /// Recalls a per-mille share of the recorded balance.
    Recall(usize, u128),
    Settle(usize),
    Rebalance,
}

const USERS: [Address; 2] = [ALICE, BOB];
const DOMAINS: [(DomainId, Address); 2] = [(D1, D1_VAULT), (D2, D2_VAULT)];

fn user_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 1..5_000_000u128).prop_map(|(u, a)| Op::Deposit(u, a)),
        (0..2usize, 1..5_000_000u128).prop_map(|(u, s)| Op::Mint(u, s)),
        (0..2usize, 1..3_000_000u128).prop_map(|(u, a)| Op::Withdraw(u, a)),
        (0..2usize, 1..3_000_000u128).prop_map(|(u, s)| Op::Redeem(u, s)),
        (0..2usize, 1..1_000_000u128).prop_map(|(u, s)| Op::Transfer(u, s)),
    ]
}

fn keeper_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 1..2_000_000u128).prop_map(|(d, a)| Op::Deploy(d, a)),
        Just(Op::CollectFees),
        (0..2usize, 0..3_000u32, 900..1_100u128).prop_map(|(d, apy, f)| Op::Report(d, apy, f)),
        (0..2usize, 0..3_000u32, 900..1_100u128, 0..7_200i64)
            .prop_map(|(d, apy, f, age)| Op::Inbound(d, apy, f, age)),
        (0..64usize).prop_map(Op::Replay),
        (0..2usize, 1..=1_000u128).prop_map(|(d, pm)| Op::Recall(d, pm)),
        (0..8usize).prop_map(Op::Settle),
        Just(Op::Rebalance),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![user_op(), keeper_op()]
}

/// A ledger plus every inbound delivery made so far.
struct Model {
    h: Harness,
    delivered: Vec<(DomainId, Vec<u8>)>,
}

impl Model {
    fn new() -> Self {
        let mut h = Harness::new();
        h.register_domains(t0());
        Self {
            h,
            delivered: Vec::new(),
        }
    }

    fn deployed(&self, domain: DomainId) -> u128 {
        self.h.ledger.domain(domain).map_or(0, |r| r.deployed_amount)
    }

    fn deliver(&mut self, origin: DomainId, payload: Vec<u8>, now: chrono::DateTime<chrono::Utc>) {
        let sender = if origin == D1 { D1_VAULT } else { D2_VAULT };
        let _ = self.h.ledger.handle_incoming_message(origin, sender, &payload, now);
        self.delivered.push((origin, payload));
    }

    /// Applies `op` at `step` and returns the events it committed.
    fn apply(&mut self, op: &Op, step: i64) -> Vec<VaultEvent> {
        let now = t0() + secs(step * 600);
        let _ = match *op {
            Op::Deposit(u, assets) => {
                self.h.fund(USERS[u], assets);
                self.h.ledger.deposit(USERS[u], assets, USERS[u], now).map(drop)
            }
            Op::Mint(u, shares) => {
                if let Ok(cost) = self.h.ledger.preview_mint(shares) {
                    self.h.fund(USERS[u], cost);
                }
                self.h.ledger.mint(USERS[u], shares, USERS[u], now).map(drop)
            }
            Op::Withdraw(u, assets) => self
                .h
                .ledger
                .withdraw(USERS[u], assets, USERS[u], USERS[u], now)
                .map(drop),
            Op::Redeem(u, shares) => self
                .h
                .ledger
                .redeem(USERS[u], shares, USERS[u], USERS[u], now)
                .map(drop),
            Op::Transfer(u, shares) => self
                .h
                .ledger
                .transfer_shares(USERS[u], USERS[1 - u], shares, now),
            Op::Deploy(d, amount) => self
                .h
                .ledger
                .deploy_to_child_vault(KEEPER, DOMAINS[d].0, amount, now)
                .map(drop),
            Op::CollectFees => self.h.ledger.collect_management_fees(now).map(drop),
            Op::Report(d, apy, factor) => {
                let domain = DOMAINS[d].0;
                let deployed = self.deployed(domain) * factor / 1_000;
                self.h
                    .ledger
                    .report_yield(KEEPER, domain, apy, deployed, now)
                    .map(drop)
            }
            Op::Inbound(d, apy, factor, age) => {
                let domain = DOMAINS[d].0;
                let deployed = self.deployed(domain) * factor / 1_000;
                let payload = CrossDomainMessage::yield_report(domain, apy, deployed, now - secs(age))
                    .encode()
                    .unwrap();
                self.deliver(domain, payload, now);
                Ok(())
            }
            Op::Replay(i) => {
                if !self.delivered.is_empty() {
                    let (origin, payload) = self.delivered[i % self.delivered.len()].clone();
                    self.deliver(origin, payload, now);
                }
                Ok(())
            }
            Op::Recall(d, per_mille) => {
                let domain = DOMAINS[d].0;
                let amount = self.deployed(domain) * per_mille / 1_000;
                self.h
                    .ledger
                    .recall_from_child_vault(KEEPER, domain, amount, now)
                    .map(drop)
            }
            Op::Settle(i) => {
                let pending: Vec<_> = self.h.ledger.pending_recalls().cloned().collect();
                if let Some(recall) = pending.get(i % pending.len().max(1)) {
                    let payload = CrossDomainMessage::RecallSettled {
                        domain_id: recall.domain_id,
                        recall_id: recall.recall_id,
                        amount: recall.amount,
                    }
                    .encode()
                    .unwrap();
                    self.deliver(recall.domain_id, payload, now);
                }
                Ok(())
            }
            Op::Rebalance => self.h.ledger.rebalance(KEEPER, now).map(drop),
        };
        self.h.ledger.take_events()
    }
}

fn steps() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 1..48)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn identities_hold_after_any_sequence(ops in steps()) {
        let mut m = Model::new();

        for (step, op) in ops.iter().enumerate() {
            let idle_before = m.h.ledger.state().idle_buffer;
            m.apply(op, i64::try_from(step).unwrap());
            let state = m.h.ledger.state();

            prop_assert!(m.h.ledger.check_invariants().is_ok(), "after {op:?}");
            prop_assert_eq!(
                state.total_assets().unwrap(),
                state.idle_buffer + state.total_deployed
            );
            prop_assert_eq!(state.shares.sum_of_balances(), state.shares.total_supply());
            // Gains can lift the reserve above the buffer; nothing may drain
            // the buffer below it.
            if state.idle_buffer < idle_before {
                prop_assert!(
                    state.idle_buffer >= state.required_buffer().unwrap(),
                    "buffer {} below reserve {} after {op:?}",
                    state.idle_buffer,
                    state.required_buffer().unwrap()
                );
            }
        }
    }

    #[test]
    fn share_price_falls_only_on_loss_or_fee(ops in steps()) {
        let mut m = Model::new();

        for (step, op) in ops.iter().enumerate() {
            let before = m.h.ledger.share_price().unwrap();
            let events = m.apply(op, i64::try_from(step).unwrap());
            let after = m.h.ledger.share_price().unwrap();

            let explained = events.iter().any(|e| {
                matches!(e, VaultEvent::LossRealized { .. } | VaultEvent::FeesCollected { .. })
            });
            prop_assert!(
                after + 1 >= before || explained,
                "price fell from {before} to {after} after {op:?}"
            );
        }
    }

    #[test]
    fn deposit_then_redeem_never_profits(
        seed_gain in 0..5_000_000u128,
        assets in 1..10_000_000u128,
    ) {
        let mut h = Harness::new();
        h.register_domains(t0());
        if seed_gain > 0 {
            h.report(D1, 500, seed_gain, t0());
        }
        h.fund(ALICE, assets);
        let Ok(shares) = h.ledger.deposit(ALICE, assets, ALICE, t0()) else {
            // Tiny deposits into an appreciated vault round to zero shares.
            return Ok(());
        };
        let max = h.ledger.max_redeem(ALICE).unwrap();
        prop_assume!(max == shares);

        let out = h.ledger.redeem(ALICE, shares, ALICE, ALICE, t0()).unwrap();

        prop_assert!(out <= assets, "redeemed {out} for a deposit of {assets}");
        prop_assert_eq!(h.ledger.balance_of(ALICE), 0);
    }

    #[test]
    fn repeated_report_is_idempotent(
        apy_bps in 0..100_000u32,
        deployed in 0..50_000_000u128,
        offset in 0..3_600i64,
    ) {
        let mut h = Harness::new();
        h.register_domains(t0());
        let reported_at = t0() + secs(offset);
        let payload = CrossDomainMessage::yield_report(D1, apy_bps, deployed, reported_at)
            .encode()
            .unwrap();

        let first = h.ledger.handle_incoming_message(D1, D1_VAULT, &payload, reported_at);
        prop_assert!(first.is_ok());
        let after_first = h.ledger.state().clone();

        let second = h
            .ledger
            .handle_incoming_message(D1, D1_VAULT, &payload, reported_at + secs(60));
        prop_assert!(second.is_ok());
        prop_assert_eq!(h.ledger.state(), &after_first);
    }

    #[test]
    fn manual_rebalances_respect_the_window(gaps in prop::collection::vec(0..400i64, 1..30)) {
        let policy = RebalancePolicy {
            cooldown_secs: 0,
            window_secs: 1_000,
            max_per_window: 3,
            ..RebalancePolicy::default()
        };
        let mut h = Harness::with_params(LedgerParams {
            rebalance: policy.clone(),
            ..LedgerParams::default()
        });
        h.register_domains(t0());
        let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 500_000, t0()) else {
            panic!("deploy");
        };

        let mut now = t0();
        let mut executed = Vec::new();
        for gap in gaps {
            now += secs(gap);
            if h.ledger.rebalance_between(KEEPER, D1, D2, 1, now).is_ok() {
                executed.push(now);
            }
        }

        for (i, at) in executed.iter().enumerate() {
            let window_start = *at - secs(policy.window_secs);
            let in_window = executed[..=i].iter().filter(|t| **t > window_start).count();
            prop_assert!(in_window <= policy.max_per_window);
        }
    }
}
