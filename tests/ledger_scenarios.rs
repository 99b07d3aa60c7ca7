//! End-to-end ledger scenarios against the in-memory channels.

#![allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use common::*;
use meridian_vault::channel::{CrossDomainMessage, Stablecoin};
use meridian_vault::domain::{Address, VaultEvent};
use meridian_vault::engine::{
    HealthMonitor, HealthPolicy, InboundOutcome, LedgerParams, LedgerStatus, RebalanceOutcome,
    RebalancePolicy, Role, SkipReason,
};
use meridian_vault::error::{
    AuthorizationFailure, MalformedInput, PolicyViolation, StateViolation, VaultError,
};

/// D1 holds 50 at 10% APY, D2 holds nothing at 20%.
fn two_domains() -> Harness {
    let mut h = Harness::new();
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 50, t0()) else {
        panic!("deploy");
    };
    h.report(D1, 1_000, 50, t0());
    h.report(D2, 2_000, 0, t0());
    h.ledger.take_events();
    h
}

#[test]
fn first_deposit_prices_at_seed() {
    let mut h = Harness::new();
    let price = h.ledger.share_price().unwrap();

    let shares = h.deposit(ALICE, 100, t0());

    assert_eq!(shares, 100);
    assert_eq!(h.ledger.balance_of(ALICE), 100);
    assert_eq!(h.ledger.total_assets().unwrap(), 100 + 1_000_000);
    assert_eq!(h.ledger.share_price().unwrap(), price);
    assert_eq!(h.channels.stablecoin.balance_of(ALICE), 0);
}

#[test]
fn rebalance_moves_capital_to_better_domain() {
    let mut h = two_domains();
    let total_before = h.ledger.total_assets().unwrap();

    let Ok(RebalanceOutcome::Executed(plan)) = h.ledger.rebalance(KEEPER, t0()) else {
        panic!("rebalance should execute");
    };

    assert_eq!(plan.target, D2);
    let Some(reallocation) = &plan.reallocation else {
        panic!("D1 should be drained");
    };
    assert_eq!(reallocation.from, D1);
    assert_eq!(reallocation.amount, 50);
    assert_eq!(plan.buffer_deployment, 899_950);

    assert_eq!(h.ledger.domain(D1).unwrap().deployed_amount, 0);
    assert_eq!(h.ledger.domain(D2).unwrap().deployed_amount, 900_000);
    assert_eq!(h.ledger.state().idle_buffer, 100_000);
    assert_eq!(h.ledger.total_assets().unwrap(), total_before);
    assert_eq!(h.ledger.state().history.last_rebalance_at(), Some(t0()));
    assert!(h.ledger.check_invariants().is_ok());

    let events = h.ledger.take_events();
    assert!(events.iter().any(|e| matches!(e, VaultEvent::CapitalReallocated { .. })));
    assert!(events.iter().any(|e| matches!(e, VaultEvent::Rebalanced { .. })));

    let instructions: Vec<_> = h
        .channels
        .messenger
        .sent()
        .into_iter()
        .filter_map(|m| CrossDomainMessage::decode(&m.payload).ok())
        .filter(|m| matches!(m, CrossDomainMessage::ReallocationInstruction { .. }))
        .collect();
    assert_eq!(
        instructions,
        vec![CrossDomainMessage::ReallocationInstruction {
            destination: D2,
            recipient: D2_VAULT,
            amount: 50,
        }]
    );
}

#[test]
fn rebalance_below_threshold_changes_nothing() {
    let mut h = two_domains();
    let policy = RebalancePolicy {
        min_apy_diff_bps: 1_000,
        ..RebalancePolicy::default()
    };
    let Ok(()) = h.ledger.set_rebalance_policy(ADMIN, policy) else {
        panic!("policy");
    };
    h.ledger.take_events();
    let before = h.ledger.state().clone();

    let Ok(RebalanceOutcome::Skipped(reason)) = h.ledger.rebalance(KEEPER, t0()) else {
        panic!("rebalance should skip");
    };

    assert!(matches!(
        reason,
        SkipReason::BelowThreshold {
            differential_bps: 1_000,
            required_bps: 1_000,
            ..
        }
    ));
    assert_eq!(h.ledger.state(), &before);
    assert!(h.ledger.take_events().is_empty());
}

#[test]
fn pause_blocks_deposits() {
    let mut h = Harness::new();
    h.fund(ALICE, 10);
    let Ok(()) = h.ledger.emergency_pause(KEEPER, t0()) else {
        panic!("pause");
    };

    let result = h.ledger.deposit(ALICE, 10, ALICE, t0());

    assert!(matches!(result, Err(VaultError::State(StateViolation::Paused))));
    assert_eq!(h.ledger.max_deposit().unwrap(), 0);
    assert_eq!(h.ledger.max_withdraw(ADMIN).unwrap(), 0);
    assert_eq!(h.channels.stablecoin.balance_of(ALICE), 10);

    // Only an admin lifts the pause.
    assert!(matches!(
        h.ledger.emergency_unpause(KEEPER, t0()),
        Err(VaultError::Unauthorized(AuthorizationFailure::MissingRole { .. }))
    ));
    let Ok(()) = h.ledger.emergency_unpause(ADMIN, t0()) else {
        panic!("unpause");
    };
    assert_eq!(h.ledger.status(), LedgerStatus::Active);
    assert!(h.ledger.deposit(ALICE, 10, ALICE, t0()).is_ok());
}

#[test]
fn pause_still_allows_share_transfers_and_reports() {
    let mut h = Harness::new();
    h.register_domains(t0());
    h.deposit(ALICE, 1_000, t0());
    let Ok(()) = h.ledger.emergency_pause(ADMIN, t0()) else {
        panic!("pause");
    };

    assert!(h.ledger.transfer_shares(ALICE, BOB, 400, t0()).is_ok());
    assert_eq!(h.ledger.balance_of(BOB), 400);
    assert!(h.ledger.report_yield(KEEPER, D1, 500, 0, t0()).is_ok());
    assert!(matches!(
        h.ledger.deploy_to_child_vault(KEEPER, D1, 1, t0()),
        Err(VaultError::State(StateViolation::Paused))
    ));
    assert!(matches!(
        h.ledger.rebalance(KEEPER, t0()),
        Err(VaultError::State(StateViolation::Paused))
    ));
    assert!(matches!(
        h.ledger.emergency_pause(ADMIN, t0()),
        Err(VaultError::State(StateViolation::Paused))
    ));
}

#[test]
fn second_rebalance_within_cooldown_is_noop() {
    let mut h = two_domains();
    let Ok(RebalanceOutcome::Executed(_)) = h.ledger.rebalance(KEEPER, t0()) else {
        panic!("first rebalance should execute");
    };
    // Give the buffer something to deploy again.
    h.deposit(ALICE, 500_000, t0() + secs(30));
    h.ledger.take_events();
    let before = h.ledger.state().clone();

    let Ok(RebalanceOutcome::Skipped(reason)) = h.ledger.rebalance(KEEPER, t0() + secs(60)) else {
        panic!("second rebalance should skip");
    };

    assert_eq!(
        reason,
        SkipReason::Cooldown {
            remaining_secs: 3_540
        }
    );
    assert_eq!(h.ledger.state().history.last_rebalance_at(), Some(t0()));
    assert_eq!(h.ledger.state(), &before);
    assert!(h.ledger.take_events().is_empty());
}

#[test]
fn malformed_payload_leaves_record_untouched() {
    let mut h = two_domains();
    let before = h.ledger.domain(D1).unwrap().clone();

    let result = h
        .ledger
        .handle_incoming_message(D1, D1_VAULT, &[0xff, 0x13, 0x37], t0() + secs(5));

    assert!(matches!(
        result,
        Err(VaultError::Malformed(MalformedInput::UndecodablePayload(_)))
    ));
    assert_eq!(h.ledger.domain(D1).unwrap(), &before);
    assert!(h.ledger.take_events().is_empty());
}

#[test]
fn inbound_messages_are_verified_against_registry() {
    let mut h = two_domains();
    let payload = CrossDomainMessage::yield_report(D1, 900, 60, t0() + secs(10))
        .encode()
        .unwrap();
    let before = h.ledger.state().clone();

    assert!(matches!(
        h.ledger
            .handle_incoming_message(D1, Address::repeat_byte(0x66), &payload, t0() + secs(10)),
        Err(VaultError::Unauthorized(AuthorizationFailure::UnverifiedSender { .. }))
    ));
    assert!(matches!(
        h.ledger
            .handle_incoming_message(D2, D2_VAULT, &payload, t0() + secs(10)),
        Err(VaultError::Malformed(MalformedInput::DomainMismatch { .. }))
    ));
    let unknown = CrossDomainMessage::yield_report(
        meridian_vault::domain::DomainId::new(7),
        900,
        0,
        t0(),
    )
    .encode()
    .unwrap();
    assert!(matches!(
        h.ledger.handle_incoming_message(
            meridian_vault::domain::DomainId::new(7),
            D1_VAULT,
            &unknown,
            t0()
        ),
        Err(VaultError::Unauthorized(AuthorizationFailure::UnknownDomain(_)))
    ));
    let outbound = CrossDomainMessage::RecallRequest {
        recall_id: 1,
        amount: 1,
        recipient: D1_VAULT,
    }
    .encode()
    .unwrap();
    assert!(matches!(
        h.ledger.handle_incoming_message(D1, D1_VAULT, &outbound, t0()),
        Err(VaultError::Malformed(MalformedInput::UnexpectedMessage(_)))
    ));
    assert_eq!(h.ledger.state(), &before);

    let Ok(InboundOutcome::ReportApplied {
        previous_deployed,
        deployed_amount,
        ..
    }) = h
        .ledger
        .handle_incoming_message(D1, D1_VAULT, &payload, t0() + secs(10))
    else {
        panic!("verified report should apply");
    };
    assert_eq!((previous_deployed, deployed_amount), (50, 60));
    assert_eq!(h.ledger.domain(D1).unwrap().reported_apy_bps, 900);
    assert!(h.ledger.check_invariants().is_ok());
}

#[test]
fn duplicate_report_is_idempotent() {
    let mut h = two_domains();
    let payload = CrossDomainMessage::yield_report(D1, 1_100, 55, t0() + secs(20))
        .encode()
        .unwrap();

    assert!(
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &payload, t0() + secs(20))
            .is_ok()
    );
    let once = h.ledger.state().clone();
    assert!(
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &payload, t0() + secs(25))
            .is_ok()
    );
    assert_eq!(h.ledger.state(), &once);

    // An older report arriving late is dropped.
    let stale = CrossDomainMessage::yield_report(D1, 300, 10, t0() + secs(15))
        .encode()
        .unwrap();
    let Ok(InboundOutcome::ReportIgnored { .. }) =
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &stale, t0() + secs(30))
    else {
        panic!("older report should be ignored");
    };
    assert_eq!(h.ledger.state(), &once);
}

#[test]
fn report_with_lower_balance_realizes_loss() {
    let mut h = two_domains();
    h.deposit(ALICE, 1_000_000, t0());
    let price = h.ledger.share_price().unwrap();
    h.ledger.take_events();

    h.report(D1, 1_000, 20, t0() + secs(60));

    assert!(h.ledger.share_price().unwrap() < price);
    assert_eq!(h.ledger.state().total_deployed, 20);
    let events = h.ledger.take_events();
    assert!(events.iter().any(|e| matches!(e, VaultEvent::LossRealized { .. })));
}

#[test]
fn deposit_at_cap_succeeds_one_more_fails() {
    let params = LedgerParams {
        deposit_cap: 2_000_000,
        ..LedgerParams::default()
    };
    let mut h = Harness::with_params(params);
    h.fund(ALICE, 1_000_001);

    assert!(h.ledger.deposit(ALICE, 1_000_000, ALICE, t0()).is_ok());
    assert_eq!(h.ledger.max_deposit().unwrap(), 0);
    assert!(matches!(
        h.ledger.deposit(ALICE, 1, ALICE, t0()),
        Err(VaultError::Policy(PolicyViolation::DepositCapExceeded {
            attempted: 2_000_001,
            cap: 2_000_000
        }))
    ));
}

#[test]
fn deposit_then_withdraw_round_trips() {
    let mut h = Harness::new();
    h.deposit(ALICE, 123_457, t0());

    let Ok(burned) = h.ledger.withdraw(ALICE, 123_457, ALICE, ALICE, t0()) else {
        panic!("withdraw");
    };

    assert_eq!(burned, 123_457);
    assert_eq!(h.ledger.balance_of(ALICE), 0);
    assert_eq!(h.channels.stablecoin.balance_of(ALICE), 123_457);
    assert_eq!(h.ledger.total_assets().unwrap(), 1_000_000);
}

#[test]
fn mint_and_redeem_round_in_vault_favour() {
    let mut h = two_domains();
    h.deposit(ALICE, 1_000_000, t0());
    // Yield lifts the price above 1.
    h.report(D1, 1_000, 333, t0() + secs(1));
    h.fund(BOB, 1_000);

    let Ok(paid) = h.ledger.mint(BOB, 100, BOB, t0() + secs(2)) else {
        panic!("mint");
    };
    let Ok(received) = h.ledger.redeem(BOB, 100, BOB, BOB, t0() + secs(2)) else {
        panic!("redeem");
    };

    assert!(received <= paid);
    assert!(h.ledger.check_invariants().is_ok());
}

#[test]
fn withdrawals_respect_buffer_reserve() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 900_000, t0()) else {
        panic!("deploy");
    };
    h.deposit(ALICE, 20_000, t0());
    assert_eq!(h.ledger.state().deployable_surplus().unwrap(), 18_000);
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 18_000, t0()) else {
        panic!("deploy surplus");
    };
    assert!(matches!(
        h.ledger.deploy_to_child_vault(KEEPER, D1, 1, t0()),
        Err(VaultError::Policy(PolicyViolation::InsufficientBuffer { .. }))
    ));

    assert_eq!(h.ledger.max_withdraw(ALICE).unwrap(), 0);
    assert!(matches!(
        h.ledger.withdraw(ALICE, 1, ALICE, ALICE, t0()),
        Err(VaultError::Policy(PolicyViolation::InsufficientBuffer {
            requested: 1,
            available: 0
        }))
    ));

    let Ok(()) = h.ledger.set_buffer_management(ADMIN, false) else {
        panic!("disable buffer management");
    };
    assert!(h.ledger.withdraw(ALICE, 20_000, ALICE, ALICE, t0()).is_ok());
}

#[test]
fn withdraw_requires_owner() {
    let mut h = Harness::new();
    h.deposit(ALICE, 1_000, t0());

    assert!(matches!(
        h.ledger.withdraw(BOB, 10, BOB, ALICE, t0()),
        Err(VaultError::Unauthorized(AuthorizationFailure::NotOwner { .. }))
    ));
    assert!(matches!(
        h.ledger.redeem(ALICE, 1_001, ALICE, ALICE, t0()),
        Err(VaultError::Policy(PolicyViolation::InsufficientShares { .. }))
    ));
}

#[test]
fn failed_transfer_rolls_back_deployment() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let before = h.ledger.state().clone();
    h.channels.transfer.fail_next(1);

    let result = h.ledger.deploy_to_child_vault(KEEPER, D1, 10_000, t0());

    assert!(matches!(result, Err(VaultError::Channel(_))));
    assert_eq!(h.ledger.state(), &before);
    assert!(h.ledger.take_events().is_empty());
    assert!(h.channels.transfer.transfers().is_empty());
}

#[test]
fn failed_instruction_rolls_back_rebalance() {
    let mut h = two_domains();
    let before = h.ledger.state().clone();
    h.channels.messenger.fail_next(1);

    assert!(matches!(
        h.ledger.rebalance(KEEPER, t0()),
        Err(VaultError::Channel(_))
    ));
    assert_eq!(h.ledger.state(), &before);
}

#[test]
fn sent_instruction_converges_through_reports_after_failed_transfer() {
    let mut h = two_domains();
    let before = h.ledger.state().clone();
    let total_before = h.ledger.total_assets().unwrap();
    h.channels.transfer.fail_next(1);

    assert!(matches!(
        h.ledger.rebalance(KEEPER, t0()),
        Err(VaultError::Channel(_))
    ));
    assert_eq!(h.ledger.state(), &before);
    // The instruction left before the buffer transfer failed.
    let instructed = h
        .channels
        .messenger
        .sent()
        .into_iter()
        .filter_map(|m| CrossDomainMessage::decode(&m.payload).ok())
        .any(|m| matches!(m, CrossDomainMessage::ReallocationInstruction { amount: 50, .. }));
    assert!(instructed);

    // Both sides report what they actually hold after following it.
    h.report(D1, 1_000, 0, t0() + secs(60));
    h.report(D2, 2_000, 50, t0() + secs(60));

    assert_eq!(h.ledger.domain(D1).unwrap().deployed_amount, 0);
    assert_eq!(h.ledger.domain(D2).unwrap().deployed_amount, 50);
    assert_eq!(h.ledger.total_assets().unwrap(), total_before);
    assert!(h.ledger.check_invariants().is_ok());
}

#[test]
fn recall_settles_into_buffer_once() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 500_000, t0()) else {
        panic!("deploy");
    };

    let Ok(recall_id) = h.ledger.recall_from_child_vault(KEEPER, D1, 200_000, t0()) else {
        panic!("recall");
    };
    assert_eq!(h.ledger.pending_recalls().count(), 1);
    // Nothing moves until settlement.
    assert_eq!(h.ledger.domain(D1).unwrap().deployed_amount, 500_000);
    assert!(matches!(
        h.ledger.recall_from_child_vault(KEEPER, D1, 300_001, t0()),
        Err(VaultError::Policy(PolicyViolation::ExceedsDeployment {
            deployed: 300_000,
            ..
        }))
    ));

    let settled = CrossDomainMessage::RecallSettled {
        domain_id: D1,
        recall_id,
        amount: 200_000,
    }
    .encode()
    .unwrap();
    let Ok(InboundOutcome::RecallSettled { amount, .. }) =
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &settled, t0() + secs(600))
    else {
        panic!("settlement");
    };
    assert_eq!(amount, 200_000);
    assert_eq!(h.ledger.domain(D1).unwrap().deployed_amount, 300_000);
    assert_eq!(h.ledger.state().idle_buffer, 700_000);
    assert_eq!(h.ledger.total_assets().unwrap(), 1_000_000);
    assert_eq!(h.ledger.pending_recalls().count(), 0);

    let after = h.ledger.state().clone();
    let Ok(InboundOutcome::RecallAlreadySettled { .. }) =
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &settled, t0() + secs(700))
    else {
        panic!("duplicate settlement");
    };
    assert_eq!(h.ledger.state(), &after);
}

#[test]
fn manual_rebalance_honours_rate_limit() {
    let mut h = two_domains();
    let policy = RebalancePolicy {
        cooldown_secs: 0,
        max_per_window: 2,
        ..RebalancePolicy::default()
    };
    let Ok(()) = h.ledger.set_rebalance_policy(ADMIN, policy) else {
        panic!("policy");
    };

    assert!(h.ledger.rebalance_between(KEEPER, D1, D2, 20, t0() + secs(1)).is_ok());
    assert!(h.ledger.rebalance_between(KEEPER, D2, D1, 10, t0() + secs(2)).is_ok());
    assert!(matches!(
        h.ledger.rebalance_between(KEEPER, D1, D2, 5, t0() + secs(3)),
        Err(VaultError::State(StateViolation::RateLimited { executed: 2, max: 2 }))
    ));
    assert!(matches!(
        h.ledger.rebalance_between(KEEPER, D1, D1, 5, t0() + secs(3)),
        Err(VaultError::Malformed(MalformedInput::SameDomain(_)))
    ));
    // The window rolls forward.
    assert!(
        h.ledger
            .rebalance_between(KEEPER, D1, D2, 5, t0() + secs(86_402))
            .is_ok()
    );
    assert_eq!(h.ledger.domain(D1).unwrap().deployed_amount, 35);
    assert_eq!(h.ledger.domain(D2).unwrap().deployed_amount, 15);
}

#[test]
fn fee_change_waits_for_timelock() {
    let mut h = Harness::new();
    assert!(matches!(
        h.ledger.propose_fee_rate(ADMIN, 600, t0()),
        Err(VaultError::Policy(PolicyViolation::FeeAboveCeiling { .. }))
    ));
    let Ok(executable_at) = h.ledger.propose_fee_rate(ADMIN, 200, t0()) else {
        panic!("propose");
    };
    assert_eq!(executable_at, t0() + secs(172_800));

    assert!(matches!(
        h.ledger.execute_fee_rate(ADMIN, t0() + secs(100)),
        Err(VaultError::State(StateViolation::FeeTimelockActive {
            remaining_secs: 172_700
        }))
    ));
    let Ok(old) = h.ledger.execute_fee_rate(ADMIN, executable_at) else {
        panic!("execute");
    };

    assert_eq!(old, 100);
    assert_eq!(h.ledger.state().fees.rate_bps, 200);
    // Fees accrued under the old rate were collected first.
    assert!(h.ledger.balance_of(h.ledger.params().fee_recipient) > 0);
    assert!(matches!(
        h.ledger.execute_fee_rate(ADMIN, executable_at),
        Err(VaultError::State(StateViolation::NoPendingFeeUpdate))
    ));
}

#[test]
fn fee_collection_dilutes_without_moving_assets() {
    let mut h = Harness::new();
    h.deposit(ALICE, 9_000_000, t0());
    let total = h.ledger.total_assets().unwrap();

    let Ok(collected) = h
        .ledger
        .collect_management_fees(t0() + secs(31_536_000))
    else {
        panic!("collect");
    };

    // One year at 1% on 10M.
    assert_eq!(collected.fee_assets, 100_000);
    assert_eq!(h.ledger.total_assets().unwrap(), total);
    let recipient = h.ledger.params().fee_recipient;
    assert_eq!(h.ledger.balance_of(recipient), collected.fee_shares);
    let Ok(value) = h.ledger.convert_to_assets(collected.fee_shares) else {
        panic!("convert");
    };
    assert!((99_990..=100_000).contains(&value));

    // Nothing more accrues at the same instant.
    let Ok(again) = h.ledger.collect_management_fees(t0() + secs(31_536_000)) else {
        panic!("collect again");
    };
    assert_eq!(again.fee_shares, 0);
}

#[test]
fn health_monitor_pauses_on_stale_domain() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 1_000, t0()) else {
        panic!("deploy");
    };
    let monitor = HealthMonitor::new(KEEPER, HealthPolicy::default());

    assert!(monitor.inspect(&h.ledger, t0() + secs(60)).is_healthy());

    let later = t0() + secs(21_601);
    let report = monitor.inspect(&h.ledger, later);
    // D2 holds nothing, so only D1 counts.
    assert_eq!(report.stale_domains(), vec![D1]);

    let Ok(enforcement) = monitor.enforce(&mut h.ledger, later) else {
        panic!("enforce");
    };
    assert!(enforcement.paused);
    assert_eq!(h.ledger.status(), LedgerStatus::Paused);

    // Already paused: a second pass reports but does not pause again.
    let Ok(again) = monitor.enforce(&mut h.ledger, later) else {
        panic!("enforce again");
    };
    assert!(!again.paused);
}

#[test]
fn stale_domains_are_not_rebalance_candidates() {
    let mut h = two_domains();
    let later = t0() + secs(21_601);
    h.report(D1, 1_000, 50, later);

    let Ok(RebalanceOutcome::Executed(plan)) = h.ledger.rebalance(KEEPER, later) else {
        panic!("rebalance should execute into the buffer-only plan");
    };

    // D2's report has gone stale, so D1 is the only candidate.
    assert_eq!(plan.target, D1);
    assert!(plan.reallocation.is_none());
}

#[test]
fn retired_domain_keeps_history_and_rejects_messages() {
    let mut h = two_domains();
    let Ok(()) = h.ledger.retire_child_vault(ADMIN, D2, t0()) else {
        panic!("retire");
    };

    assert_eq!(h.ledger.domain(D2).unwrap().reported_apy_bps, 2_000);
    assert!(matches!(
        h.ledger.retire_child_vault(ADMIN, D2, t0()),
        Err(VaultError::Policy(PolicyViolation::DomainInactive(_)))
    ));
    let payload = CrossDomainMessage::yield_report(D2, 1, 1, t0()).encode().unwrap();
    assert!(matches!(
        h.ledger.handle_incoming_message(D2, D2_VAULT, &payload, t0()),
        Err(VaultError::Unauthorized(AuthorizationFailure::UnknownDomain(_)))
    ));

    // Reactivation keeps the record.
    let Ok(()) = h.ledger.add_child_vault(ADMIN, D2, D2_VAULT, t0()) else {
        panic!("reactivate");
    };
    assert_eq!(h.ledger.domain(D2).unwrap().reported_apy_bps, 2_000);
    assert!(matches!(
        h.ledger.add_child_vault(ADMIN, D2, D2_VAULT, t0()),
        Err(VaultError::Policy(PolicyViolation::DomainAlreadyActive(_)))
    ));
}

#[test]
fn domain_with_capital_cannot_retire() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 500_000, t0()) else {
        panic!("deploy");
    };
    let Ok(recall_id) = h.ledger.recall_from_child_vault(KEEPER, D1, 100_000, t0()) else {
        panic!("recall");
    };

    assert!(matches!(
        h.ledger.retire_child_vault(ADMIN, D1, t0()),
        Err(VaultError::Policy(PolicyViolation::DomainHoldsCapital {
            deployed: 500_000,
            pending_recalls: 1,
            ..
        }))
    ));
    assert!(h.ledger.domain(D1).unwrap().is_active());

    // Drained by a report, but the recall is still in flight.
    h.report(D1, 0, 0, t0() + secs(60));
    assert!(matches!(
        h.ledger.retire_child_vault(ADMIN, D1, t0() + secs(60)),
        Err(VaultError::Policy(PolicyViolation::DomainHoldsCapital {
            deployed: 0,
            pending_recalls: 1,
            ..
        }))
    ));

    let settled = CrossDomainMessage::RecallSettled {
        domain_id: D1,
        recall_id,
        amount: 100_000,
    }
    .encode()
    .unwrap();
    let Ok(InboundOutcome::RecallSettled { .. }) =
        h.ledger
            .handle_incoming_message(D1, D1_VAULT, &settled, t0() + secs(120))
    else {
        panic!("settlement");
    };
    let Ok(()) = h.ledger.retire_child_vault(ADMIN, D1, t0() + secs(120)) else {
        panic!("empty domain should retire");
    };
}

#[test]
fn fee_change_from_zero_rate_does_not_backdate() {
    let mut h = Harness::with_params(LedgerParams {
        management_fee_bps: 0,
        ..LedgerParams::default()
    });
    h.deposit(ALICE, 9_000_000, t0());
    let Ok(_) = h.ledger.propose_fee_rate(ADMIN, 500, t0()) else {
        panic!("propose");
    };
    let year_later = t0() + secs(31_536_000);

    let Ok(0) = h.ledger.execute_fee_rate(ADMIN, year_later) else {
        panic!("execute");
    };
    assert_eq!(h.ledger.state().fees.last_collected_at, Some(year_later));
    assert_eq!(h.ledger.balance_of(h.ledger.params().fee_recipient), 0);

    let Ok(collected) = h.ledger.collect_management_fees(year_later + secs(86_400)) else {
        panic!("collect");
    };

    // One day at 5% on 10M.
    assert_eq!(collected.fee_assets, 1_369);
}

#[test]
fn zero_rate_keeps_the_accrual_clock_moving() {
    let mut h = Harness::with_params(LedgerParams {
        management_fee_bps: 0,
        ..LedgerParams::default()
    });
    let later = t0() + secs(86_400);

    let Ok(collected) = h.ledger.collect_management_fees(later) else {
        panic!("collect");
    };

    assert_eq!(collected.fee_shares, 0);
    assert_eq!(h.ledger.state().fees.last_collected_at, Some(later));
}

#[test]
fn total_loss_blocks_entry_with_state_error() {
    let mut h = Harness::with_params(LedgerParams {
        buffer_bps: 0,
        buffer_management_enabled: false,
        ..LedgerParams::default()
    });
    h.register_domains(t0());
    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, 1_000_000, t0()) else {
        panic!("deploy");
    };
    h.report(D1, 0, 0, t0() + secs(60));
    assert_eq!(h.ledger.total_assets().unwrap(), 0);
    h.fund(ALICE, 1_000);

    assert!(matches!(
        h.ledger.deposit(ALICE, 1_000, ALICE, t0() + secs(120)),
        Err(VaultError::State(StateViolation::SharesWorthless))
    ));
    assert!(matches!(
        h.ledger.mint(ALICE, 1_000, ALICE, t0() + secs(120)),
        Err(VaultError::State(StateViolation::SharesWorthless))
    ));
    assert_eq!(h.ledger.max_mint().unwrap(), 0);
    assert_eq!(h.ledger.max_redeem(ALICE).unwrap(), 0);
}

#[test]
fn privileged_operations_check_roles() {
    let mut h = Harness::new();

    assert!(matches!(
        h.ledger.add_child_vault(ALICE, D1, D1_VAULT, t0()),
        Err(VaultError::Unauthorized(AuthorizationFailure::MissingRole {
            role: Role::Admin,
            ..
        }))
    ));
    assert!(matches!(
        h.ledger.rebalance(ALICE, t0()),
        Err(VaultError::Unauthorized(AuthorizationFailure::MissingRole {
            role: Role::Rebalancer,
            ..
        }))
    ));
    assert!(matches!(
        h.ledger.emergency_pause(ALICE, t0()),
        Err(VaultError::Unauthorized(_))
    ));
    assert!(h.ledger.revoke_role(ADMIN, ADMIN, Role::Admin).is_err());
    assert!(matches!(
        h.ledger.initialize(ADMIN, t0()),
        Err(VaultError::State(StateViolation::AlreadyInitialized))
    ));
}

#[test]
fn seed_shares_stay_locked() {
    let mut h = Harness::new();
    h.deposit(ALICE, 1_000, t0());

    assert!(matches!(
        h.ledger.transfer_shares(ALICE, Address::SEED_SINK, 1, t0()),
        Err(VaultError::Policy(PolicyViolation::SeedLocked))
    ));
    assert!(h.ledger.transfer_shares(Address::SEED_SINK, ALICE, 1, t0()).is_err());
    assert_eq!(h.ledger.balance_of(Address::SEED_SINK), 1_000_000);
}

#[test]
fn deployment_never_dips_below_reserve() {
    let mut h = Harness::new();
    h.register_domains(t0());
    let surplus = h.ledger.state().deployable_surplus().unwrap();
    assert_eq!(surplus, 900_000);

    let Ok(_) = h.ledger.deploy_to_child_vault(KEEPER, D1, surplus, t0()) else {
        panic!("deploying the whole surplus should succeed");
    };
    assert_eq!(
        h.ledger.state().idle_buffer,
        h.ledger.state().required_buffer().unwrap()
    );

    // Strict policy: not even one unit may be borrowed from the reserve.
    assert!(matches!(
        h.ledger.deploy_to_child_vault(KEEPER, D2, 1, t0()),
        Err(VaultError::Policy(PolicyViolation::InsufficientBuffer {
            requested: 1,
            available: 0
        }))
    ));
    assert_eq!(h.ledger.domain(D2).unwrap().deployed_amount, 0);
}
