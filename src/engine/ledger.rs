//! The vault ledger: share accounting, buffer policy and capital movement.
//!
//! Every mutating entry point runs inside [`Ledger::transact`], which
//! checkpoints the [`LedgerState`] and the event outbox and restores both if
//! the operation fails. Internal effects are applied before any channel
//! call, so a channel failure unwinds the effects along with everything
//! else. Channel calls are never retried here.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::access::Role;
use super::fees::{accrued_fee, fee_shares};
use super::rebalancer::{RebalanceDecision, RebalancePlan, RebalancePolicy, SkipReason, decide};
use super::shares::{Rounding, assets_to_shares, share_price, shares_to_assets};
use super::state::{LedgerParams, LedgerState, LedgerStatus, PendingRecall};
use crate::channel::{
    AssetTransferChannel, CrossDomainMessage, MessageChannel, MessageId, Stablecoin, TransferId,
};
use crate::domain::{Address, DomainId, DomainRecord, VaultEvent};
use crate::error::{
    AuthorizationFailure, MalformedInput, PolicyViolation, StateViolation, VaultError,
};

/// Reports above this APY are rejected as implausible.
pub const MAX_PLAUSIBLE_APY_BPS: u32 = 100_000;

/// How far in the future a report timestamp may be.
pub const MAX_REPORT_CLOCK_SKEW_SECS: i64 = 300;

/// External collaborators the ledger calls into.
#[derive(Debug)]
pub struct Ports {
    /// Token users deposit.
    pub stablecoin: Arc<dyn Stablecoin>,
    /// Bridge used to deploy capital.
    pub transfer: Arc<dyn AssetTransferChannel>,
    /// Messenger used for notices, instructions and recalls.
    pub messenger: Arc<dyn MessageChannel>,
}

impl Ports {
    /// Bundles the three channels.
    #[must_use]
    pub fn new(
        stablecoin: Arc<dyn Stablecoin>,
        transfer: Arc<dyn AssetTransferChannel>,
        messenger: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            stablecoin,
            transfer,
            messenger,
        }
    }
}

/// Result of a fee collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeCollection {
    /// Fee charged, in assets.
    pub fee_assets: u128,
    /// Shares minted to the fee recipient.
    pub fee_shares: u128,
}

/// Result of [`Ledger::rebalance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RebalanceOutcome {
    /// Capital moved.
    Executed(RebalancePlan),
    /// Nothing happened.
    Skipped(SkipReason),
}

/// What an accepted inbound message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A yield report overwrote the domain record.
    ReportApplied {
        /// Reporting domain.
        domain_id: DomainId,
        /// Deployed amount before the report.
        previous_deployed: u128,
        /// Deployed amount after the report.
        deployed_amount: u128,
    },
    /// A report older than the recorded one was dropped.
    ReportIgnored {
        /// Reporting domain.
        domain_id: DomainId,
        /// Timestamp of the report already applied.
        last_report_time: DateTime<Utc>,
    },
    /// A pending recall was settled.
    RecallSettled {
        /// Source domain.
        domain_id: DomainId,
        /// Correlation id.
        recall_id: u64,
        /// Amount credited to the buffer.
        amount: u128,
    },
    /// The recall id is not pending: already settled or never issued.
    RecallAlreadySettled {
        /// Source domain.
        domain_id: DomainId,
        /// Correlation id.
        recall_id: u64,
    },
    /// A deployment was acknowledged.
    DeploymentAcknowledged {
        /// Receiving domain.
        domain_id: DomainId,
        /// Acknowledged transfer.
        transfer_id: TransferId,
    },
}

impl InboundOutcome {
    /// Short name of the outcome.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ReportApplied { .. } => "report_applied",
            Self::ReportIgnored { .. } => "report_ignored",
            Self::RecallSettled { .. } => "recall_settled",
            Self::RecallAlreadySettled { .. } => "recall_already_settled",
            Self::DeploymentAcknowledged { .. } => "deployment_acknowledged",
        }
    }

    /// Domain the message came from.
    #[must_use]
    pub const fn domain_id(&self) -> DomainId {
        match self {
            Self::ReportApplied { domain_id, .. }
            | Self::ReportIgnored { domain_id, .. }
            | Self::RecallSettled { domain_id, .. }
            | Self::RecallAlreadySettled { domain_id, .. }
            | Self::DeploymentAcknowledged { domain_id, .. } => *domain_id,
        }
    }
}

/// The central vault ledger.
///
/// Owns the [`LedgerState`], the channel [`Ports`] and an outbox of
/// committed [`VaultEvent`]s which the caller drains with
/// [`Ledger::take_events`].
#[derive(Debug)]
pub struct Ledger {
    state: LedgerState,
    ports: Ports,
    outbox: Vec<VaultEvent>,
}

fn ensure_initialized(state: &LedgerState) -> Result<(), VaultError> {
    if state.status == LedgerStatus::Uninitialized {
        return Err(StateViolation::NotInitialized.into());
    }
    Ok(())
}

fn ensure_live(state: &LedgerState) -> Result<(), VaultError> {
    ensure_initialized(state)?;
    if state.status == LedgerStatus::Paused {
        return Err(StateViolation::Paused.into());
    }
    Ok(())
}

fn to_shares(state: &LedgerState, assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
    let supply = state.shares.total_supply();
    if supply == 0 {
        return Ok(assets);
    }
    assets_to_shares(assets, supply, backing(state)?, rounding)
}

/// Total assets behind a non-empty supply.
fn backing(state: &LedgerState) -> Result<u128, VaultError> {
    let total = state.total_assets()?;
    if total == 0 && state.shares.total_supply() > 0 {
        return Err(StateViolation::SharesWorthless.into());
    }
    Ok(total)
}

fn to_assets(state: &LedgerState, shares: u128, rounding: Rounding) -> Result<u128, VaultError> {
    let supply = state.shares.total_supply();
    if supply == 0 {
        return Ok(shares);
    }
    shares_to_assets(shares, supply, state.total_assets()?, rounding)
}

fn require_amount(amount: u128, name: &'static str) -> Result<(), VaultError> {
    if amount == 0 {
        return Err(MalformedInput::ZeroAmount(name).into());
    }
    Ok(())
}

fn require_address(address: Address, name: &'static str) -> Result<(), VaultError> {
    if address.is_zero() {
        return Err(MalformedInput::ZeroAddress(name).into());
    }
    Ok(())
}

impl Ledger {
    /// Creates an uninitialized ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyViolation::InvalidParameter`] if `params` are invalid.
    pub fn new(params: LedgerParams, ports: Ports) -> Result<Self, VaultError> {
        params.validate()?;
        Ok(Self {
            state: LedgerState::new(params),
            ports,
            outbox: Vec::new(),
        })
    }

    /// Rebuilds a ledger from a persisted state.
    ///
    /// # Errors
    ///
    /// Fails if the parameters are invalid or the state violates an
    /// accounting identity.
    pub fn restore(state: LedgerState, ports: Ports) -> Result<Self, VaultError> {
        state.params.validate()?;
        let violations = state.invariant_violations();
        if !violations.is_empty() {
            return Err(VaultError::Internal(format!(
                "restored state is unsound: {}",
                violations.join("; ")
            )));
        }
        Ok(Self {
            state,
            ports,
            outbox: Vec::new(),
        })
    }

    /// Read access to the full state.
    #[must_use]
    pub const fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Active policy parameters.
    #[must_use]
    pub const fn params(&self) -> &LedgerParams {
        &self.state.params
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> LedgerStatus {
        self.state.status
    }

    /// Channels the ledger calls into.
    #[must_use]
    pub const fn ports(&self) -> &Ports {
        &self.ports
    }

    /// Drains events committed since the last call.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Runs `op` atomically: on error, state and outbox are restored.
    ///
    /// A successful operation that would leave an accounting identity
    /// broken is rolled back as well.
    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Txn<'_>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let checkpoint = self.state.clone();
        let mark = self.outbox.len();
        let result = {
            let mut txn = Txn {
                state: &mut self.state,
                ports: &self.ports,
                events: &mut self.outbox,
            };
            op(&mut txn).and_then(|value| {
                let violations = txn.state.invariant_violations();
                if violations.is_empty() {
                    Ok(value)
                } else {
                    Err(VaultError::Internal(violations.join("; ")))
                }
            })
        };
        if result.is_err() {
            self.state = checkpoint;
            self.outbox.truncate(mark);
        }
        result
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    /// Genesis: pulls the seed from `caller`, locks seed shares in the sink
    /// and makes `caller` the first admin.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a second call; channel errors if the seed
    /// cannot be pulled.
    pub fn initialize(&mut self, caller: Address, now: DateTime<Utc>) -> Result<(), VaultError> {
        self.transact(|txn| txn.initialize(caller, now))
    }

    /// Freezes user flows, deployments, recalls, rebalances and fee
    /// collection.
    ///
    /// # Errors
    ///
    /// Requires Pauser or Admin; fails if already paused.
    pub fn emergency_pause(&mut self, caller: Address, now: DateTime<Utc>) -> Result<(), VaultError> {
        self.transact(|txn| txn.pause(caller, now))
    }

    /// Lifts an emergency pause.
    ///
    /// # Errors
    ///
    /// Requires Admin; fails if not paused.
    pub fn emergency_unpause(
        &mut self,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.transact(|txn| txn.unpause(caller, now))
    }

    // ── user flows ─────────────────────────────────────────────────────

    /// Deposits `assets` from `caller` and mints shares to `receiver`,
    /// rounding shares down.
    ///
    /// # Errors
    ///
    /// Paused, zero amount or receiver, zero shares out, cap exceeded, or a
    /// stablecoin failure.
    pub fn deposit(
        &mut self,
        caller: Address,
        assets: u128,
        receiver: Address,
        now: DateTime<Utc>,
    ) -> Result<u128, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            require_amount(assets, "assets")?;
            require_address(receiver, "receiver")?;
            let shares = to_shares(txn.state, assets, Rounding::Down)?;
            if shares == 0 {
                return Err(MalformedInput::RoundsToZero("deposit").into());
            }
            txn.enter(caller, receiver, assets, shares, now)?;
            Ok(shares)
        })
    }

    /// Mints exactly `shares` to `receiver`, pulling assets rounded up.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`].
    pub fn mint(
        &mut self,
        caller: Address,
        shares: u128,
        receiver: Address,
        now: DateTime<Utc>,
    ) -> Result<u128, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            require_amount(shares, "shares")?;
            require_address(receiver, "receiver")?;
            backing(txn.state)?;
            let assets = to_assets(txn.state, shares, Rounding::Up)?;
            txn.enter(caller, receiver, assets, shares, now)?;
            Ok(assets)
        })
    }

    /// Releases exactly `assets` from the buffer, burning shares rounded up.
    ///
    /// # Errors
    ///
    /// Paused, zero amount, caller not owner, insufficient shares, or the
    /// buffer policy cannot cover the request.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: u128,
        receiver: Address,
        owner: Address,
        now: DateTime<Utc>,
    ) -> Result<u128, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            require_amount(assets, "assets")?;
            require_address(receiver, "receiver")?;
            let shares = to_shares(txn.state, assets, Rounding::Up)?;
            txn.exit(caller, receiver, owner, assets, shares, now)?;
            Ok(shares)
        })
    }

    /// Burns exactly `shares`, releasing assets rounded down.
    ///
    /// # Errors
    ///
    /// As [`Ledger::withdraw`], plus zero assets out.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: u128,
        receiver: Address,
        owner: Address,
        now: DateTime<Utc>,
    ) -> Result<u128, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            require_amount(shares, "shares")?;
            require_address(receiver, "receiver")?;
            let assets = to_assets(txn.state, shares, Rounding::Down)?;
            if assets == 0 {
                return Err(MalformedInput::RoundsToZero("redeem").into());
            }
            txn.exit(caller, receiver, owner, assets, shares, now)?;
            Ok(assets)
        })
    }

    /// Moves shares between holders.
    ///
    /// # Errors
    ///
    /// Zero amount or recipient, insufficient shares, or a transfer
    /// touching the seed sink.
    pub fn transfer_shares(
        &mut self,
        caller: Address,
        to: Address,
        shares: u128,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            require_amount(shares, "shares")?;
            require_address(to, "to")?;
            if to == Address::SEED_SINK {
                return Err(PolicyViolation::SeedLocked.into());
            }
            txn.state.shares.transfer(caller, to, shares)?;
            txn.emit(VaultEvent::SharesTransferred {
                from: caller,
                to,
                shares: shares.to_string(),
                timestamp: now,
            });
            Ok(())
        })
    }

    // ── fees ───────────────────────────────────────────────────────────

    /// Mints accrued management fees to the fee recipient. A no-op when no
    /// time has passed or the fee rounds to zero shares.
    ///
    /// # Errors
    ///
    /// Paused or not initialized.
    pub fn collect_management_fees(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<FeeCollection, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.collect_fees(now)
        })
    }

    /// Proposes a new fee rate, executable after the time lock. Replaces
    /// any open proposal.
    ///
    /// # Errors
    ///
    /// Requires Admin; rate above the ceiling is a policy violation.
    pub fn propose_fee_rate(
        &mut self,
        caller: Address,
        rate_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            let max_bps = txn.state.params.max_management_fee_bps;
            if rate_bps > max_bps {
                return Err(PolicyViolation::FeeAboveCeiling { rate_bps, max_bps }.into());
            }
            txn.state.fees.pending = Some(super::fees::PendingFeeUpdate {
                proposed_rate_bps: rate_bps,
                proposed_at: now,
                executed: false,
            });
            let executable_at = now + Duration::seconds(txn.state.params.fee_timelock_secs);
            txn.emit(VaultEvent::FeeRateProposed {
                rate_bps,
                executable_at,
            });
            Ok(executable_at)
        })
    }

    /// Applies the open proposal once its time lock has passed, collecting
    /// fees accrued under the old rate first.
    ///
    /// # Errors
    ///
    /// Requires Admin; no open proposal, time lock active, or paused.
    pub fn execute_fee_rate(
        &mut self,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<u32, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            let Some(pending) = txn.state.fees.open_proposal().cloned() else {
                return Err(StateViolation::NoPendingFeeUpdate.into());
            };
            let ready_at = pending.proposed_at + Duration::seconds(txn.state.params.fee_timelock_secs);
            let remaining_secs = ready_at.signed_duration_since(now).num_seconds();
            if remaining_secs > 0 {
                return Err(StateViolation::FeeTimelockActive { remaining_secs }.into());
            }
            txn.collect_fees(now)?;
            // The new rate accrues from here on, never over the old period.
            txn.state.fees.last_collected_at = Some(now);
            let old_rate_bps = txn.state.fees.rate_bps;
            txn.state.fees.rate_bps = pending.proposed_rate_bps;
            txn.state.fees.pending = Some(super::fees::PendingFeeUpdate {
                executed: true,
                ..pending
            });
            txn.emit(VaultEvent::FeeRateUpdated {
                old_rate_bps,
                new_rate_bps: txn.state.fees.rate_bps,
                timestamp: now,
            });
            Ok(old_rate_bps)
        })
    }

    /// Drops the open fee proposal.
    ///
    /// # Errors
    ///
    /// Requires Admin; fails if nothing is pending.
    pub fn cancel_fee_rate(&mut self, caller: Address) -> Result<(), VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            let Some(pending) = txn.state.fees.open_proposal().cloned() else {
                return Err(StateViolation::NoPendingFeeUpdate.into());
            };
            txn.state.fees.pending = None;
            txn.emit(VaultEvent::FeeRateCancelled {
                rate_bps: pending.proposed_rate_bps,
            });
            Ok(())
        })
    }

    // ── domains ────────────────────────────────────────────────────────

    /// Registers a child vault, or reactivates a retired one.
    ///
    /// # Errors
    ///
    /// Requires Admin; zero address; domain already active.
    pub fn add_child_vault(
        &mut self,
        caller: Address,
        domain_id: DomainId,
        vault_address: Address,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            require_address(vault_address, "vault_address")?;
            let reactivated = txn.state.registry.get(domain_id).is_ok();
            txn.state.registry.register(domain_id, vault_address, now)?;
            txn.emit(VaultEvent::DomainRegistered {
                domain_id,
                vault_address,
                reactivated,
                timestamp: now,
            });
            Ok(())
        })
    }

    /// Retires an empty child vault. Its record and history are kept.
    ///
    /// # Errors
    ///
    /// Requires Admin; unknown or already inactive domain; capital still
    /// deployed there or a recall from it unsettled.
    pub fn retire_child_vault(
        &mut self,
        caller: Address,
        domain_id: DomainId,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            let pending_recalls = txn
                .state
                .pending_recalls
                .values()
                .filter(|r| r.domain_id == domain_id)
                .count();
            let record = txn.state.registry.get_mut(domain_id)?;
            if !record.is_active() {
                return Err(PolicyViolation::DomainInactive(domain_id).into());
            }
            if record.deployed_amount > 0 || pending_recalls > 0 {
                return Err(PolicyViolation::DomainHoldsCapital {
                    domain_id,
                    deployed: record.deployed_amount,
                    pending_recalls,
                }
                .into());
            }
            record.status = crate::domain::DomainStatus::Inactive;
            let deployed_amount = record.deployed_amount.to_string();
            txn.emit(VaultEvent::DomainRetired {
                domain_id,
                deployed_amount,
                timestamp: now,
            });
            Ok(())
        })
    }

    /// Deploys buffer surplus to an active domain.
    ///
    /// # Errors
    ///
    /// Requires Manager; paused; zero amount; inactive domain; amount above
    /// `buffer − required_buffer`; transfer channel failure.
    pub fn deploy_to_child_vault(
        &mut self,
        caller: Address,
        domain_id: DomainId,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<TransferId, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.state.access.require(caller, Role::Manager)?;
            require_amount(amount, "amount")?;
            let recipient = txn.state.registry.get_active(domain_id)?.vault_address;
            let available = txn.state.deployable_surplus()?;
            if amount > available {
                return Err(PolicyViolation::InsufficientBuffer {
                    requested: amount,
                    available,
                }
                .into());
            }
            txn.dispatch_capital(domain_id, recipient, amount, now)
        })
    }

    /// Asks a domain to send capital back. Accounting changes only when the
    /// matching settlement arrives.
    ///
    /// # Errors
    ///
    /// Requires Manager; paused; zero amount; inactive domain; amount above
    /// what is deployed and not already being recalled; message failure.
    pub fn recall_from_child_vault(
        &mut self,
        caller: Address,
        domain_id: DomainId,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.state.access.require(caller, Role::Manager)?;
            require_amount(amount, "amount")?;
            txn.recall(domain_id, amount, now)
        })
    }

    /// Manual oracle path: overwrites a domain's yield and deployed amount,
    /// stamped with `now`.
    ///
    /// # Errors
    ///
    /// Requires Manager; inactive domain; implausible APY.
    pub fn report_yield(
        &mut self,
        caller: Address,
        domain_id: DomainId,
        apy_bps: u32,
        deployed_amount: u128,
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome, VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Manager)?;
            txn.state.registry.get_active(domain_id)?;
            txn.apply_report(domain_id, apy_bps, deployed_amount, now, now)
        })
    }

    /// Verifies and applies a message delivered by the message channel.
    ///
    /// Nothing is mutated unless `origin` is an active registered domain,
    /// `sender` is its vault address, and the payload decodes to an inbound
    /// kind naming the same domain.
    ///
    /// # Errors
    ///
    /// Undecodable or outbound payload, domain mismatch, unknown or inactive
    /// domain, unverified sender, implausible report.
    pub fn handle_incoming_message(
        &mut self,
        origin: DomainId,
        sender: Address,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome, VaultError> {
        self.transact(|txn| txn.receive(origin, sender, payload, now))
    }

    // ── rebalancing ────────────────────────────────────────────────────

    /// Runs the decision rule and executes it if it triggers.
    ///
    /// # Errors
    ///
    /// Requires Rebalancer; paused; channel failure during execution.
    pub fn rebalance(
        &mut self,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<RebalanceOutcome, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.state.access.require(caller, Role::Rebalancer)?;
            let surplus = txn.state.deployable_surplus()?;
            let decision = decide(
                &txn.state.registry,
                surplus,
                &txn.state.history,
                &txn.state.params.rebalance,
                now,
            );
            match decision {
                RebalanceDecision::Skip(reason) => {
                    tracing::debug!(%reason, "rebalance skipped");
                    Ok(RebalanceOutcome::Skipped(reason))
                }
                RebalanceDecision::Execute(plan) => {
                    txn.execute_plan(&plan, now)?;
                    Ok(RebalanceOutcome::Executed(plan))
                }
            }
        })
    }

    /// Forces a reallocation between two domains, bypassing the APY rule
    /// but not the cooldown or rate limit.
    ///
    /// # Errors
    ///
    /// Requires Rebalancer; paused; same domain; zero amount; cooldown or
    /// rate limit; inactive destination; amount above the source holding.
    pub fn rebalance_between(
        &mut self,
        caller: Address,
        from: DomainId,
        to: DomainId,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<RebalancePlan, VaultError> {
        self.transact(|txn| {
            ensure_live(txn.state)?;
            txn.state.access.require(caller, Role::Rebalancer)?;
            if from == to {
                return Err(MalformedInput::SameDomain(from).into());
            }
            require_amount(amount, "amount")?;
            txn.state
                .history
                .ensure_allowed(now, &txn.state.params.rebalance)?;
            let from_apy_bps = txn.state.registry.get(from)?.reported_apy_bps;
            let target_apy_bps = txn.state.registry.get_active(to)?.reported_apy_bps;
            let plan = RebalancePlan {
                target: to,
                target_apy_bps,
                reallocation: Some(super::rebalancer::Reallocation {
                    from,
                    from_apy_bps,
                    amount,
                }),
                buffer_deployment: 0,
            };
            txn.execute_plan(&plan, now)?;
            Ok(plan)
        })
    }

    /// What [`Ledger::rebalance`] would do at `now`.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow only.
    pub fn preview_rebalance(&self, now: DateTime<Utc>) -> Result<RebalanceDecision, VaultError> {
        Ok(decide(
            &self.state.registry,
            self.state.deployable_surplus()?,
            &self.state.history,
            &self.state.params.rebalance,
            now,
        ))
    }

    // ── administration ─────────────────────────────────────────────────

    /// Grants `role` to `account`.
    ///
    /// # Errors
    ///
    /// Requires Admin; zero account.
    pub fn grant_role(&mut self, caller: Address, account: Address, role: Role) -> Result<bool, VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            require_address(account, "account")?;
            let granted = txn.state.access.grant(account, role);
            if granted {
                txn.emit(VaultEvent::RoleGranted { account, role });
            }
            Ok(granted)
        })
    }

    /// Revokes `role` from `account`. The last admin cannot be removed.
    ///
    /// # Errors
    ///
    /// Requires Admin; removing the last admin.
    pub fn revoke_role(&mut self, caller: Address, account: Address, role: Role) -> Result<bool, VaultError> {
        self.transact(|txn| {
            ensure_initialized(txn.state)?;
            txn.state.access.require(caller, Role::Admin)?;
            if role == Role::Admin
                && txn.state.access.has_role(account, Role::Admin)
                && txn.state.access.holders(Role::Admin) == 1
            {
                return Err(PolicyViolation::InvalidParameter {
                    name: "role",
                    reason: "cannot revoke the last admin".into(),
                }
                .into());
            }
            let revoked = txn.state.access.revoke(account, role);
            if revoked {
                txn.emit(VaultEvent::RoleRevoked { account, role });
            }
            Ok(revoked)
        })
    }

    /// Sets the deposit cap.
    ///
    /// # Errors
    ///
    /// Requires Admin; cap below the seed.
    pub fn set_deposit_cap(&mut self, caller: Address, cap: u128) -> Result<(), VaultError> {
        self.transact(|txn| {
            txn.update_params(caller, "deposit_cap", cap.to_string(), |p| p.deposit_cap = cap)
        })
    }

    /// Sets the buffer reserve ratio.
    ///
    /// # Errors
    ///
    /// Requires Admin; ratio of 100% or more.
    pub fn set_buffer_bps(&mut self, caller: Address, buffer_bps: u32) -> Result<(), VaultError> {
        self.transact(|txn| {
            txn.update_params(caller, "buffer_bps", buffer_bps.to_string(), |p| {
                p.buffer_bps = buffer_bps;
            })
        })
    }

    /// Enables or disables buffer management for withdrawals.
    ///
    /// # Errors
    ///
    /// Requires Admin.
    pub fn set_buffer_management(&mut self, caller: Address, enabled: bool) -> Result<(), VaultError> {
        self.transact(|txn| {
            txn.update_params(caller, "buffer_management_enabled", enabled.to_string(), |p| {
                p.buffer_management_enabled = enabled;
            })
        })
    }

    /// Replaces the rebalance policy.
    ///
    /// # Errors
    ///
    /// Requires Admin; invalid policy.
    pub fn set_rebalance_policy(
        &mut self,
        caller: Address,
        policy: RebalancePolicy,
    ) -> Result<(), VaultError> {
        self.transact(|txn| {
            let value = format!("{policy:?}");
            txn.update_params(caller, "rebalance", value, |p| p.rebalance = policy)
        })
    }

    /// Changes the fee recipient.
    ///
    /// # Errors
    ///
    /// Requires Admin; zero or seed-sink recipient.
    pub fn set_fee_recipient(&mut self, caller: Address, recipient: Address) -> Result<(), VaultError> {
        self.transact(|txn| {
            txn.update_params(caller, "fee_recipient", recipient.to_string(), |p| {
                p.fee_recipient = recipient;
            })
        })
    }

    // ── views ──────────────────────────────────────────────────────────

    /// Buffer plus deployed capital.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn total_assets(&self) -> Result<u128, VaultError> {
        self.state.total_assets()
    }

    /// Shares outstanding.
    #[must_use]
    pub const fn total_supply(&self) -> u128 {
        self.state.shares.total_supply()
    }

    /// Shares held by `holder`.
    #[must_use]
    pub fn balance_of(&self, holder: Address) -> u128 {
        self.state.shares.balance_of(holder)
    }

    /// Assets per share scaled by [`super::shares::PRICE_SCALE`].
    ///
    /// # Errors
    ///
    /// Arithmetic overflow or zero supply.
    pub fn share_price(&self) -> Result<u128, VaultError> {
        share_price(self.state.total_assets()?, self.state.shares.total_supply())
    }

    /// Shares for `assets`, rounded down.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        to_shares(&self.state, assets, Rounding::Down)
    }

    /// Assets for `shares`, rounded down.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        to_assets(&self.state, shares, Rounding::Down)
    }

    /// Shares a deposit of `assets` would mint.
    ///
    /// # Errors
    ///
    /// [`StateViolation::SharesWorthless`] after a total loss; arithmetic
    /// overflow.
    pub fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        to_shares(&self.state, assets, Rounding::Down)
    }

    /// Assets a mint of `shares` would pull.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn preview_mint(&self, shares: u128) -> Result<u128, VaultError> {
        to_assets(&self.state, shares, Rounding::Up)
    }

    /// Shares a withdrawal of `assets` would burn.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn preview_withdraw(&self, assets: u128) -> Result<u128, VaultError> {
        to_shares(&self.state, assets, Rounding::Up)
    }

    /// Assets a redemption of `shares` would release.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        to_assets(&self.state, shares, Rounding::Down)
    }

    /// Largest deposit accepted right now; zero while paused.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn max_deposit(&self) -> Result<u128, VaultError> {
        if ensure_live(&self.state).is_err() {
            return Ok(0);
        }
        Ok(self
            .state
            .params
            .deposit_cap
            .saturating_sub(self.state.total_assets()?))
    }

    /// Largest mint accepted right now; zero while paused.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn max_mint(&self) -> Result<u128, VaultError> {
        if backing(&self.state).is_err() {
            return Ok(0);
        }
        let assets = self.max_deposit()?;
        to_shares(&self.state, assets, Rounding::Down)
    }

    /// Largest withdrawal `owner` can make right now; zero while paused.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn max_withdraw(&self, owner: Address) -> Result<u128, VaultError> {
        if ensure_live(&self.state).is_err() || owner == Address::SEED_SINK {
            return Ok(0);
        }
        let owned = to_assets(&self.state, self.balance_of(owner), Rounding::Down)?;
        Ok(owned.min(self.state.withdrawable_buffer()?))
    }

    /// Largest redemption `owner` can make right now; zero while paused.
    ///
    /// # Errors
    ///
    /// Arithmetic overflow.
    pub fn max_redeem(&self, owner: Address) -> Result<u128, VaultError> {
        if ensure_live(&self.state).is_err()
            || owner == Address::SEED_SINK
            || backing(&self.state).is_err()
        {
            return Ok(0);
        }
        let servable = to_shares(&self.state, self.state.withdrawable_buffer()?, Rounding::Down)?;
        Ok(self.balance_of(owner).min(servable))
    }

    /// The record for `domain_id`.
    ///
    /// # Errors
    ///
    /// [`VaultError::DomainNotFound`].
    pub fn domain(&self, domain_id: DomainId) -> Result<&DomainRecord, VaultError> {
        self.state.registry.get(domain_id)
    }

    /// Recalls awaiting settlement.
    pub fn pending_recalls(&self) -> impl Iterator<Item = &PendingRecall> {
        self.state.pending_recalls.values()
    }

    /// Verifies the accounting identities.
    ///
    /// # Errors
    ///
    /// [`VaultError::Internal`] listing every violated identity.
    pub fn check_invariants(&self) -> Result<(), VaultError> {
        let violations = self.state.invariant_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(VaultError::Internal(violations.join("; ")))
        }
    }
}

/// Mutable view handed to operations inside [`Ledger::transact`].
struct Txn<'a> {
    state: &'a mut LedgerState,
    ports: &'a Ports,
    events: &'a mut Vec<VaultEvent>,
}

impl Txn<'_> {
    fn emit(&mut self, event: VaultEvent) {
        self.events.push(event);
    }

    fn vault(&self) -> Address {
        self.state.params.vault_address
    }

    fn initialize(&mut self, caller: Address, now: DateTime<Utc>) -> Result<(), VaultError> {
        if self.state.status != LedgerStatus::Uninitialized {
            return Err(StateViolation::AlreadyInitialized.into());
        }
        require_address(caller, "caller")?;
        let seed = self.state.params.seed_amount;
        self.state.shares.mint_seed(seed)?;
        self.state.idle_buffer = seed;
        self.state.access.grant(caller, Role::Admin);
        self.state.status = LedgerStatus::Active;
        self.state.fees.last_collected_at = Some(now);
        self.emit(VaultEvent::Initialized {
            seed_amount: seed.to_string(),
            admin: caller,
            timestamp: now,
        });
        let vault = self.vault();
        self.ports.stablecoin.transfer_from(vault, caller, vault, seed)?;
        Ok(())
    }

    fn pause(&mut self, caller: Address, now: DateTime<Utc>) -> Result<(), VaultError> {
        ensure_initialized(self.state)?;
        self.state
            .access
            .require_any(caller, &[Role::Pauser, Role::Admin])?;
        if self.state.status == LedgerStatus::Paused {
            return Err(StateViolation::Paused.into());
        }
        self.state.status = LedgerStatus::Paused;
        self.emit(VaultEvent::Paused {
            by: caller,
            timestamp: now,
        });
        Ok(())
    }

    fn unpause(&mut self, caller: Address, now: DateTime<Utc>) -> Result<(), VaultError> {
        ensure_initialized(self.state)?;
        self.state.access.require(caller, Role::Admin)?;
        if self.state.status != LedgerStatus::Paused {
            return Err(StateViolation::NotPaused.into());
        }
        self.state.status = LedgerStatus::Active;
        self.emit(VaultEvent::Unpaused {
            by: caller,
            timestamp: now,
        });
        Ok(())
    }

    fn enter(
        &mut self,
        caller: Address,
        receiver: Address,
        assets: u128,
        shares: u128,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        if receiver == Address::SEED_SINK {
            return Err(PolicyViolation::SeedLocked.into());
        }
        let cap = self.state.params.deposit_cap;
        let attempted = self
            .state
            .total_assets()?
            .checked_add(assets)
            .ok_or(VaultError::ArithmeticOverflow)?;
        if attempted > cap {
            return Err(PolicyViolation::DepositCapExceeded { attempted, cap }.into());
        }
        self.state.shares.mint(receiver, shares)?;
        self.state.idle_buffer = self
            .state
            .idle_buffer
            .checked_add(assets)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.emit(VaultEvent::Deposited {
            caller,
            receiver,
            assets: assets.to_string(),
            shares: shares.to_string(),
            timestamp: now,
        });
        let vault = self.vault();
        self.ports
            .stablecoin
            .transfer_from(vault, caller, vault, assets)?;
        Ok(())
    }

    fn exit(
        &mut self,
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: u128,
        shares: u128,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        if caller != owner {
            return Err(AuthorizationFailure::NotOwner { caller, owner }.into());
        }
        let balance = self.state.shares.balance_of(owner);
        if shares > balance {
            return Err(PolicyViolation::InsufficientShares {
                requested: shares,
                balance,
            }
            .into());
        }
        let available = self.state.withdrawable_buffer()?;
        if assets > available {
            return Err(PolicyViolation::InsufficientBuffer {
                requested: assets,
                available,
            }
            .into());
        }
        self.state.shares.burn(owner, shares)?;
        self.state.idle_buffer = self
            .state
            .idle_buffer
            .checked_sub(assets)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.emit(VaultEvent::Withdrawn {
            caller,
            receiver,
            owner,
            assets: assets.to_string(),
            shares: shares.to_string(),
            timestamp: now,
        });
        let vault = self.vault();
        self.ports.stablecoin.transfer(vault, receiver, assets)?;
        Ok(())
    }

    fn collect_fees(&mut self, now: DateTime<Utc>) -> Result<FeeCollection, VaultError> {
        let Some(last) = self.state.fees.last_collected_at else {
            self.state.fees.last_collected_at = Some(now);
            return Ok(FeeCollection::default());
        };
        let elapsed = now.signed_duration_since(last).num_seconds();
        if elapsed <= 0 {
            return Ok(FeeCollection::default());
        }
        let total = self.state.total_assets()?;
        let supply = self.state.shares.total_supply();
        let fee = accrued_fee(
            total,
            self.state.fees.rate_bps,
            self.state.params.max_management_fee_bps,
            u128::from(elapsed.unsigned_abs()),
        )?;
        let minted = fee_shares(fee, total, supply)?;
        if minted == 0 {
            // Sub-share accruals carry over; a zero rate accrues nothing.
            if self.state.fees.rate_bps == 0 {
                self.state.fees.last_collected_at = Some(now);
            }
            return Ok(FeeCollection::default());
        }
        let recipient = self.state.params.fee_recipient;
        self.state.shares.mint(recipient, minted)?;
        self.state.fees.last_collected_at = Some(now);
        self.state.fees.total_collected = self
            .state
            .fees
            .total_collected
            .checked_add(fee)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.emit(VaultEvent::FeesCollected {
            fee_assets: fee.to_string(),
            fee_shares: minted.to_string(),
            recipient,
            timestamp: now,
        });
        Ok(FeeCollection {
            fee_assets: fee,
            fee_shares: minted,
        })
    }

    fn send(&self, destination: DomainId, message: &CrossDomainMessage) -> Result<MessageId, VaultError> {
        let payload = message
            .encode()
            .map_err(|e| VaultError::Internal(e.to_string()))?;
        Ok(self.ports.messenger.send(destination, &payload)?)
    }

    /// Sends an informational message; failure is logged, not propagated.
    fn notify(&self, destination: DomainId, message: &CrossDomainMessage) {
        if let Err(e) = self.send(destination, message) {
            tracing::warn!(
                domain_id = %destination,
                kind = message.kind(),
                error = %e,
                "notice not delivered"
            );
        }
    }

    fn dispatch_capital(
        &mut self,
        domain_id: DomainId,
        recipient: Address,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<TransferId, VaultError> {
        let available = self.state.idle_buffer;
        self.state.idle_buffer =
            available
                .checked_sub(amount)
                .ok_or(PolicyViolation::InsufficientBuffer {
                    requested: amount,
                    available,
                })?;
        self.state.total_deployed = self
            .state
            .total_deployed
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let record = self.state.registry.get_mut(domain_id)?;
        record.deployed_amount = record
            .deployed_amount
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;

        let transfer_id = self.ports.transfer.transfer(amount, domain_id, recipient)?;
        self.emit(VaultEvent::CapitalDeployed {
            domain_id,
            amount: amount.to_string(),
            transfer_id,
            timestamp: now,
        });
        self.notify(
            domain_id,
            &CrossDomainMessage::DeploymentNotice {
                transfer_id,
                amount,
            },
        );
        Ok(transfer_id)
    }

    fn reallocate(
        &mut self,
        from: DomainId,
        to: DomainId,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let recipient = self.state.registry.get_active(to)?.vault_address;
        let source = self.state.registry.get_mut(from)?;
        let deployed = source.deployed_amount;
        source.deployed_amount =
            deployed
                .checked_sub(amount)
                .ok_or(PolicyViolation::ExceedsDeployment {
                    domain_id: from,
                    requested: amount,
                    deployed,
                })?;
        let target = self.state.registry.get_mut(to)?;
        target.deployed_amount = target
            .deployed_amount
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.emit(VaultEvent::CapitalReallocated {
            from,
            to,
            amount: amount.to_string(),
            timestamp: now,
        });
        self.send(
            from,
            &CrossDomainMessage::ReallocationInstruction {
                destination: to,
                recipient,
                amount,
            },
        )?;
        Ok(())
    }

    /// Instruction message first, transfer last: a transfer that went out
    /// must never be unwound from the books.
    ///
    /// A failed transfer still rolls the whole plan back, but the instruction
    /// has already left. Records stay at their pre-plan values until the
    /// source and target report their actual balances, which restores
    /// `Σ deployed` to what the domains hold.
    fn execute_plan(&mut self, plan: &RebalancePlan, now: DateTime<Utc>) -> Result<(), VaultError> {
        let target = plan.target;
        let mut reallocated = 0;
        let mut source = None;
        if let Some(reallocation) = &plan.reallocation {
            self.reallocate(reallocation.from, target, reallocation.amount, now)?;
            reallocated = reallocation.amount;
            source = Some(reallocation.from);
        }
        if plan.buffer_deployment > 0 {
            let recipient = self.state.registry.get_active(target)?.vault_address;
            self.dispatch_capital(target, recipient, plan.buffer_deployment, now)?;
        }
        let state = &mut *self.state;
        state.history.record(now, &state.params.rebalance);
        self.emit(VaultEvent::Rebalanced {
            target,
            source,
            reallocated: reallocated.to_string(),
            deployed_from_buffer: plan.buffer_deployment.to_string(),
            timestamp: now,
        });
        Ok(())
    }

    fn recall(&mut self, domain_id: DomainId, amount: u128, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let deployed = self.state.registry.get_active(domain_id)?.deployed_amount;
        let in_flight = self
            .state
            .pending_recalls
            .values()
            .filter(|r| r.domain_id == domain_id)
            .try_fold(0u128, |acc, r| acc.checked_add(r.amount))
            .ok_or(VaultError::ArithmeticOverflow)?;
        let recallable = deployed.saturating_sub(in_flight);
        if amount > recallable {
            return Err(PolicyViolation::ExceedsDeployment {
                domain_id,
                requested: amount,
                deployed: recallable,
            }
            .into());
        }
        let recall_id = self.state.next_recall_id;
        self.state.next_recall_id = recall_id
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.state.pending_recalls.insert(
            recall_id,
            PendingRecall {
                recall_id,
                domain_id,
                amount,
                requested_at: now,
            },
        );
        self.emit(VaultEvent::RecallRequested {
            domain_id,
            recall_id,
            amount: amount.to_string(),
            timestamp: now,
        });
        let recipient = self.vault();
        self.send(
            domain_id,
            &CrossDomainMessage::RecallRequest {
                recall_id,
                amount,
                recipient,
            },
        )?;
        Ok(recall_id)
    }

    fn receive(
        &mut self,
        origin: DomainId,
        sender: Address,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome, VaultError> {
        ensure_initialized(self.state)?;
        let message = CrossDomainMessage::decode(payload)?;
        let Some(claimed) = message.inbound_domain() else {
            return Err(MalformedInput::UnexpectedMessage(message.kind()).into());
        };
        if claimed != origin {
            return Err(MalformedInput::DomainMismatch {
                origin,
                payload: claimed,
            }
            .into());
        }
        let expected = match self.state.registry.get(origin) {
            Ok(record) if record.is_active() => record.vault_address,
            _ => return Err(AuthorizationFailure::UnknownDomain(origin).into()),
        };
        if expected != sender {
            return Err(AuthorizationFailure::UnverifiedSender {
                domain_id: origin,
                sender,
            }
            .into());
        }

        match message {
            CrossDomainMessage::YieldReport {
                apy_bps,
                deployed_amount,
                reported_at,
                ..
            } => {
                let stamped = DateTime::from_timestamp(reported_at, 0).ok_or_else(|| {
                    MalformedInput::ImplausibleReport(format!("timestamp {reported_at} out of range"))
                })?;
                self.apply_report(origin, apy_bps, deployed_amount, stamped, now)
            }
            CrossDomainMessage::RecallSettled {
                recall_id, amount, ..
            } => self.settle_recall(origin, recall_id, amount, now),
            CrossDomainMessage::DeploymentAcknowledged {
                transfer_id,
                amount,
                ..
            } => {
                self.emit(VaultEvent::DeploymentAcknowledged {
                    domain_id: origin,
                    transfer_id,
                    amount: amount.to_string(),
                    timestamp: now,
                });
                Ok(InboundOutcome::DeploymentAcknowledged {
                    domain_id: origin,
                    transfer_id,
                })
            }
            other => Err(MalformedInput::UnexpectedMessage(other.kind()).into()),
        }
    }

    fn apply_report(
        &mut self,
        domain_id: DomainId,
        apy_bps: u32,
        deployed_amount: u128,
        reported_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome, VaultError> {
        if apy_bps > MAX_PLAUSIBLE_APY_BPS {
            return Err(MalformedInput::ImplausibleReport(format!(
                "apy {apy_bps} bps exceeds {MAX_PLAUSIBLE_APY_BPS}"
            ))
            .into());
        }
        if reported_at > now + Duration::seconds(MAX_REPORT_CLOCK_SKEW_SECS) {
            return Err(MalformedInput::ImplausibleReport(format!(
                "report dated {reported_at} is in the future"
            ))
            .into());
        }
        let record = self.state.registry.get_mut(domain_id)?;
        if let Some(last) = record.last_report_time.filter(|last| reported_at < *last) {
            return Ok(InboundOutcome::ReportIgnored {
                domain_id,
                last_report_time: last,
            });
        }
        let previous = record.deployed_amount;
        record.deployed_amount = deployed_amount;
        record.reported_apy_bps = apy_bps;
        record.last_report_time = Some(reported_at);
        self.state.total_deployed = self
            .state
            .total_deployed
            .checked_sub(previous)
            .and_then(|rest| rest.checked_add(deployed_amount))
            .ok_or(VaultError::ArithmeticOverflow)?;

        self.emit(VaultEvent::YieldReported {
            domain_id,
            apy_bps,
            deployed_amount: deployed_amount.to_string(),
            previous_deployed: previous.to_string(),
            reported_at,
        });
        if deployed_amount < previous {
            self.emit(VaultEvent::LossRealized {
                domain_id,
                amount: previous.saturating_sub(deployed_amount).to_string(),
                timestamp: now,
            });
        }
        Ok(InboundOutcome::ReportApplied {
            domain_id,
            previous_deployed: previous,
            deployed_amount,
        })
    }

    fn settle_recall(
        &mut self,
        origin: DomainId,
        recall_id: u64,
        amount: u128,
        now: DateTime<Utc>,
    ) -> Result<InboundOutcome, VaultError> {
        let Some(pending) = self.state.pending_recalls.get(&recall_id) else {
            return Ok(InboundOutcome::RecallAlreadySettled {
                domain_id: origin,
                recall_id,
            });
        };
        if pending.domain_id != origin {
            return Err(MalformedInput::DomainMismatch {
                origin,
                payload: pending.domain_id,
            }
            .into());
        }
        self.state.pending_recalls.remove(&recall_id);
        let record = self.state.registry.get_mut(origin)?;
        let reduction = amount.min(record.deployed_amount);
        record.deployed_amount = record.deployed_amount.saturating_sub(reduction);
        self.state.total_deployed = self
            .state
            .total_deployed
            .checked_sub(reduction)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.state.idle_buffer = self
            .state
            .idle_buffer
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.emit(VaultEvent::RecallSettled {
            domain_id: origin,
            recall_id,
            amount: amount.to_string(),
            timestamp: now,
        });
        Ok(InboundOutcome::RecallSettled {
            domain_id: origin,
            recall_id,
            amount,
        })
    }

    fn update_params(
        &mut self,
        caller: Address,
        name: &'static str,
        value: String,
        apply: impl FnOnce(&mut LedgerParams),
    ) -> Result<(), VaultError> {
        ensure_initialized(self.state)?;
        self.state.access.require(caller, Role::Admin)?;
        let mut params = self.state.params.clone();
        apply(&mut params);
        params.validate()?;
        self.state.params = params;
        self.emit(VaultEvent::ParameterUpdated {
            name: name.to_string(),
            value,
        });
        Ok(())
    }
}
