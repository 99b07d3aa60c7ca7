//! Vault service: serializes ledger access, stamps time and publishes events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::channels::LocalChannels;
use crate::channel::{InboundMessage, OutboundMessage, TransferId, TransferRecord};
use crate::domain::{Address, DomainId, EventBus, VaultEvent};
use crate::engine::{
    Enforcement, FeeCollection, HealthMonitor, HealthReport, InboundOutcome, Ledger, LedgerState,
    RebalanceOutcome, RebalancePlan, RebalancePolicy, Role,
};
use crate::error::{MalformedInput, VaultError};
use crate::persistence::PostgresPersistence;

/// Orchestration layer for all vault operations.
///
/// Owns the [`Ledger`] behind an async `RwLock` and the [`EventBus`]. Every
/// mutation follows the same pattern: acquire the write lock, call the
/// ledger with the current time, drain its committed events, release the
/// lock, then append the events to the log and broadcast them. Events from
/// concurrent operations are published in commit order.
#[derive(Debug, Clone)]
pub struct VaultService {
    ledger: Arc<RwLock<Ledger>>,
    publish_order: Arc<Mutex<()>>,
    event_bus: EventBus,
    channels: Option<LocalChannels>,
    persistence: Option<PostgresPersistence>,
    event_log_enabled: bool,
    faucet_enabled: bool,
}

impl VaultService {
    /// Creates a new `VaultService` around `ledger`.
    #[must_use]
    pub fn new(ledger: Ledger, event_bus: EventBus) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            publish_order: Arc::new(Mutex::new(())),
            event_bus,
            channels: None,
            persistence: None,
            event_log_enabled: false,
            faucet_enabled: false,
        }
    }

    /// Attaches the in-memory channels the ledger was built with.
    #[must_use]
    pub fn with_channels(mut self, channels: LocalChannels) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Attaches PostgreSQL persistence. Events are appended to the log only
    /// when `event_log_enabled` is set.
    #[must_use]
    pub fn with_persistence(mut self, persistence: PostgresPersistence, event_log_enabled: bool) -> Self {
        self.persistence = Some(persistence);
        self.event_log_enabled = event_log_enabled;
        self
    }

    /// Enables [`VaultService::fund`].
    #[must_use]
    pub const fn with_faucet(mut self, enabled: bool) -> Self {
        self.faucet_enabled = enabled;
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the in-memory channels, if attached.
    #[must_use]
    pub fn channels(&self) -> Option<&LocalChannels> {
        self.channels.as_ref()
    }

    /// Runs a read-only closure against the ledger.
    pub async fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        let ledger = self.ledger.read().await;
        f(&ledger)
    }

    /// Clone of the full ledger state.
    pub async fn state(&self) -> LedgerState {
        self.read(|ledger| ledger.state().clone()).await
    }

    async fn execute<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Ledger, DateTime<Utc>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut ledger = self.ledger.write().await;
        let result = f(&mut ledger, Utc::now());
        let events = ledger.take_events();
        let order = self.publish_order.lock().await;
        drop(ledger);

        if let Err(e) = &result {
            tracing::debug!(op, code = e.error_code(), error = %e, "operation rejected");
        }
        self.publish(events).await;
        drop(order);
        result
    }

    async fn publish(&self, events: Vec<VaultEvent>) {
        if events.is_empty() {
            return;
        }
        if let Some(persistence) = self.persistence.as_ref().filter(|_| self.event_log_enabled) {
            for event in &events {
                if let Err(e) = persistence.save_event(event).await {
                    tracing::warn!(
                        event_type = event.event_type_str(),
                        error = %e,
                        "event not appended to log"
                    );
                }
            }
        }
        let seq = self.event_bus.publish_batch(events);
        tracing::trace!(seq, "events published");
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    /// Runs genesis as `caller`.
    ///
    /// # Errors
    ///
    /// See [`Ledger::initialize`].
    pub async fn initialize(&self, caller: Address) -> Result<(), VaultError> {
        self.execute("initialize", |l, now| l.initialize(caller, now))
            .await?;
        tracing::info!(%caller, "vault initialized");
        Ok(())
    }

    /// Emergency pause.
    ///
    /// # Errors
    ///
    /// See [`Ledger::emergency_pause`].
    pub async fn pause(&self, caller: Address) -> Result<(), VaultError> {
        self.execute("pause", |l, now| l.emergency_pause(caller, now))
            .await?;
        tracing::warn!(%caller, "vault paused");
        Ok(())
    }

    /// Lifts the emergency pause.
    ///
    /// # Errors
    ///
    /// See [`Ledger::emergency_unpause`].
    pub async fn unpause(&self, caller: Address) -> Result<(), VaultError> {
        self.execute("unpause", |l, now| l.emergency_unpause(caller, now))
            .await?;
        tracing::info!(%caller, "vault unpaused");
        Ok(())
    }

    // ── user flows ─────────────────────────────────────────────────────

    /// Deposits `assets` and returns the shares minted to `receiver`.
    ///
    /// # Errors
    ///
    /// See [`Ledger::deposit`].
    pub async fn deposit(
        &self,
        caller: Address,
        assets: u128,
        receiver: Address,
    ) -> Result<u128, VaultError> {
        let shares = self
            .execute("deposit", |l, now| l.deposit(caller, assets, receiver, now))
            .await?;
        tracing::info!(%caller, %receiver, assets, shares, "deposit");
        Ok(shares)
    }

    /// Mints exactly `shares` and returns the assets pulled.
    ///
    /// # Errors
    ///
    /// See [`Ledger::mint`].
    pub async fn mint(
        &self,
        caller: Address,
        shares: u128,
        receiver: Address,
    ) -> Result<u128, VaultError> {
        let assets = self
            .execute("mint", |l, now| l.mint(caller, shares, receiver, now))
            .await?;
        tracing::info!(%caller, %receiver, assets, shares, "mint");
        Ok(assets)
    }

    /// Withdraws exactly `assets` and returns the shares burned.
    ///
    /// # Errors
    ///
    /// See [`Ledger::withdraw`].
    pub async fn withdraw(
        &self,
        caller: Address,
        assets: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<u128, VaultError> {
        let shares = self
            .execute("withdraw", |l, now| {
                l.withdraw(caller, assets, receiver, owner, now)
            })
            .await?;
        tracing::info!(%owner, %receiver, assets, shares, "withdraw");
        Ok(shares)
    }

    /// Redeems `shares` and returns the assets released.
    ///
    /// # Errors
    ///
    /// See [`Ledger::redeem`].
    pub async fn redeem(
        &self,
        caller: Address,
        shares: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<u128, VaultError> {
        let assets = self
            .execute("redeem", |l, now| l.redeem(caller, shares, receiver, owner, now))
            .await?;
        tracing::info!(%owner, %receiver, assets, shares, "redeem");
        Ok(assets)
    }

    /// Moves shares between holders.
    ///
    /// # Errors
    ///
    /// See [`Ledger::transfer_shares`].
    pub async fn transfer_shares(
        &self,
        caller: Address,
        to: Address,
        shares: u128,
    ) -> Result<(), VaultError> {
        self.execute("transfer_shares", |l, now| {
            l.transfer_shares(caller, to, shares, now)
        })
        .await?;
        tracing::info!(from = %caller, %to, shares, "shares transferred");
        Ok(())
    }

    // ── fees ───────────────────────────────────────────────────────────

    /// Mints accrued management fees to the fee recipient.
    ///
    /// # Errors
    ///
    /// See [`Ledger::collect_management_fees`].
    pub async fn collect_fees(&self) -> Result<FeeCollection, VaultError> {
        let collected = self
            .execute("collect_fees", |l, now| l.collect_management_fees(now))
            .await?;
        if collected.fee_shares > 0 {
            tracing::info!(
                fee_assets = collected.fee_assets,
                fee_shares = collected.fee_shares,
                "management fees collected"
            );
        }
        Ok(collected)
    }

    /// Proposes a new fee rate; returns when it becomes executable.
    ///
    /// # Errors
    ///
    /// See [`Ledger::propose_fee_rate`].
    pub async fn propose_fee_rate(
        &self,
        caller: Address,
        rate_bps: u32,
    ) -> Result<DateTime<Utc>, VaultError> {
        let executable_at = self
            .execute("propose_fee_rate", |l, now| {
                l.propose_fee_rate(caller, rate_bps, now)
            })
            .await?;
        tracing::info!(rate_bps, %executable_at, "fee rate proposed");
        Ok(executable_at)
    }

    /// Applies the pending fee rate; returns the previous rate.
    ///
    /// # Errors
    ///
    /// See [`Ledger::execute_fee_rate`].
    pub async fn execute_fee_rate(&self, caller: Address) -> Result<u32, VaultError> {
        let old_rate = self
            .execute("execute_fee_rate", |l, now| l.execute_fee_rate(caller, now))
            .await?;
        tracing::info!(old_rate, "fee rate updated");
        Ok(old_rate)
    }

    /// Drops the pending fee proposal.
    ///
    /// # Errors
    ///
    /// See [`Ledger::cancel_fee_rate`].
    pub async fn cancel_fee_rate(&self, caller: Address) -> Result<(), VaultError> {
        self.execute("cancel_fee_rate", |l, _| l.cancel_fee_rate(caller))
            .await?;
        tracing::info!("fee proposal cancelled");
        Ok(())
    }

    // ── domains and capital ────────────────────────────────────────────

    /// Registers or reactivates a child vault.
    ///
    /// # Errors
    ///
    /// See [`Ledger::add_child_vault`].
    pub async fn add_domain(
        &self,
        caller: Address,
        domain_id: DomainId,
        vault_address: Address,
    ) -> Result<(), VaultError> {
        self.execute("add_domain", |l, now| {
            l.add_child_vault(caller, domain_id, vault_address, now)
        })
        .await?;
        tracing::info!(%domain_id, %vault_address, "domain registered");
        Ok(())
    }

    /// Retires a child vault.
    ///
    /// # Errors
    ///
    /// See [`Ledger::retire_child_vault`].
    pub async fn retire_domain(&self, caller: Address, domain_id: DomainId) -> Result<(), VaultError> {
        self.execute("retire_domain", |l, now| {
            l.retire_child_vault(caller, domain_id, now)
        })
        .await?;
        tracing::info!(%domain_id, "domain retired");
        Ok(())
    }

    /// Sends idle capital to a domain.
    ///
    /// # Errors
    ///
    /// See [`Ledger::deploy_to_child_vault`].
    pub async fn deploy(
        &self,
        caller: Address,
        domain_id: DomainId,
        amount: u128,
    ) -> Result<TransferId, VaultError> {
        let transfer_id = self
            .execute("deploy", |l, now| {
                l.deploy_to_child_vault(caller, domain_id, amount, now)
            })
            .await?;
        tracing::info!(%domain_id, amount, %transfer_id, "capital deployed");
        Ok(transfer_id)
    }

    /// Asks a domain to return capital; returns the recall id.
    ///
    /// # Errors
    ///
    /// See [`Ledger::recall_from_child_vault`].
    pub async fn recall(
        &self,
        caller: Address,
        domain_id: DomainId,
        amount: u128,
    ) -> Result<u64, VaultError> {
        let recall_id = self
            .execute("recall", |l, now| {
                l.recall_from_child_vault(caller, domain_id, amount, now)
            })
            .await?;
        tracing::info!(%domain_id, amount, recall_id, "recall requested");
        Ok(recall_id)
    }

    /// Records a manual yield report.
    ///
    /// # Errors
    ///
    /// See [`Ledger::report_yield`].
    pub async fn report_yield(
        &self,
        caller: Address,
        domain_id: DomainId,
        apy_bps: u32,
        deployed_amount: u128,
    ) -> Result<InboundOutcome, VaultError> {
        let outcome = self
            .execute("report_yield", |l, now| {
                l.report_yield(caller, domain_id, apy_bps, deployed_amount, now)
            })
            .await?;
        tracing::info!(%domain_id, apy_bps, deployed_amount, outcome = outcome.kind(), "manual report");
        Ok(outcome)
    }

    /// Verifies and applies a message delivered by the messaging channel.
    ///
    /// Rejections are broadcast as [`VaultEvent::MessageRejected`] and the
    /// ledger is left untouched.
    ///
    /// # Errors
    ///
    /// See [`Ledger::handle_incoming_message`].
    pub async fn handle_inbound(&self, message: InboundMessage) -> Result<InboundOutcome, VaultError> {
        let InboundMessage {
            origin,
            sender,
            payload,
        } = message;
        let result = self
            .execute("handle_inbound", |l, now| {
                l.handle_incoming_message(origin, sender, &payload, now)
            })
            .await;
        match &result {
            Ok(outcome) => {
                tracing::info!(%origin, outcome = outcome.kind(), "inbound message applied");
            }
            Err(e) => {
                tracing::warn!(%origin, %sender, error = %e, "inbound message rejected");
                let order = self.publish_order.lock().await;
                self.publish(vec![VaultEvent::MessageRejected {
                    origin,
                    sender,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                }])
                .await;
                drop(order);
            }
        }
        result
    }

    // ── rebalancing ────────────────────────────────────────────────────

    /// Runs the automatic rebalancer as `caller`.
    ///
    /// # Errors
    ///
    /// See [`Ledger::rebalance`].
    pub async fn rebalance(&self, caller: Address) -> Result<RebalanceOutcome, VaultError> {
        let outcome = self
            .execute("rebalance", |l, now| l.rebalance(caller, now))
            .await?;
        match &outcome {
            RebalanceOutcome::Executed(plan) => tracing::info!(
                target = %plan.target,
                reallocated = plan.reallocation.as_ref().map_or(0, |r| r.amount),
                deployed_from_buffer = plan.buffer_deployment,
                "rebalance executed"
            ),
            RebalanceOutcome::Skipped(reason) => tracing::debug!(%reason, "rebalance skipped"),
        }
        Ok(outcome)
    }

    /// Moves capital between two named domains.
    ///
    /// # Errors
    ///
    /// See [`Ledger::rebalance_between`].
    pub async fn rebalance_between(
        &self,
        caller: Address,
        from: DomainId,
        to: DomainId,
        amount: u128,
    ) -> Result<RebalancePlan, VaultError> {
        let plan = self
            .execute("rebalance_between", |l, now| {
                l.rebalance_between(caller, from, to, amount, now)
            })
            .await?;
        tracing::info!(%from, %to, amount, "manual rebalance executed");
        Ok(plan)
    }

    // ── health ─────────────────────────────────────────────────────────

    /// Inspects the ledger without acting.
    pub async fn health_report(&self, monitor: &HealthMonitor) -> HealthReport {
        let now = Utc::now();
        self.read(|ledger| monitor.inspect(ledger, now)).await
    }

    /// Inspects the ledger and pauses it on configured anomalies.
    ///
    /// # Errors
    ///
    /// See [`HealthMonitor::enforce`].
    pub async fn enforce_health(&self, monitor: &HealthMonitor) -> Result<Enforcement, VaultError> {
        let enforcement = self
            .execute("enforce_health", |l, now| monitor.enforce(l, now))
            .await?;
        if enforcement.paused {
            tracing::warn!(
                anomalies = enforcement.report.anomalies.len(),
                "health monitor paused the vault"
            );
        }
        Ok(enforcement)
    }

    // ── administration ─────────────────────────────────────────────────

    /// Grants `role` to `account`; returns `false` if already held.
    ///
    /// # Errors
    ///
    /// See [`Ledger::grant_role`].
    pub async fn grant_role(
        &self,
        caller: Address,
        account: Address,
        role: Role,
    ) -> Result<bool, VaultError> {
        let granted = self
            .execute("grant_role", |l, _| l.grant_role(caller, account, role))
            .await?;
        tracing::info!(%account, %role, granted, "role granted");
        Ok(granted)
    }

    /// Revokes `role` from `account`; returns `false` if not held.
    ///
    /// # Errors
    ///
    /// See [`Ledger::revoke_role`].
    pub async fn revoke_role(
        &self,
        caller: Address,
        account: Address,
        role: Role,
    ) -> Result<bool, VaultError> {
        let revoked = self
            .execute("revoke_role", |l, _| l.revoke_role(caller, account, role))
            .await?;
        tracing::info!(%account, %role, revoked, "role revoked");
        Ok(revoked)
    }

    /// Updates the deposit cap.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_deposit_cap`].
    pub async fn set_deposit_cap(&self, caller: Address, cap: u128) -> Result<(), VaultError> {
        self.execute("set_deposit_cap", |l, _| l.set_deposit_cap(caller, cap))
            .await?;
        tracing::info!(cap, "deposit cap updated");
        Ok(())
    }

    /// Updates the buffer ratio.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_buffer_bps`].
    pub async fn set_buffer_bps(&self, caller: Address, buffer_bps: u32) -> Result<(), VaultError> {
        self.execute("set_buffer_bps", |l, _| l.set_buffer_bps(caller, buffer_bps))
            .await?;
        tracing::info!(buffer_bps, "buffer ratio updated");
        Ok(())
    }

    /// Turns buffer enforcement on or off.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_buffer_management`].
    pub async fn set_buffer_management(&self, caller: Address, enabled: bool) -> Result<(), VaultError> {
        self.execute("set_buffer_management", |l, _| {
            l.set_buffer_management(caller, enabled)
        })
        .await?;
        tracing::info!(enabled, "buffer management updated");
        Ok(())
    }

    /// Replaces the rebalancer policy.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_rebalance_policy`].
    pub async fn set_rebalance_policy(
        &self,
        caller: Address,
        policy: RebalancePolicy,
    ) -> Result<(), VaultError> {
        self.execute("set_rebalance_policy", |l, _| {
            l.set_rebalance_policy(caller, policy)
        })
        .await?;
        tracing::info!("rebalance policy updated");
        Ok(())
    }

    /// Changes the fee recipient.
    ///
    /// # Errors
    ///
    /// See [`Ledger::set_fee_recipient`].
    pub async fn set_fee_recipient(&self, caller: Address, recipient: Address) -> Result<(), VaultError> {
        self.execute("set_fee_recipient", |l, _| {
            l.set_fee_recipient(caller, recipient)
        })
        .await?;
        tracing::info!(%recipient, "fee recipient updated");
        Ok(())
    }

    // ── token edge ─────────────────────────────────────────────────────

    /// Approves the vault to pull up to `amount` of `owner`'s tokens.
    ///
    /// # Errors
    ///
    /// Propagates the token's rejection.
    pub async fn approve(&self, owner: Address, amount: u128) -> Result<(), VaultError> {
        self.read(|ledger| {
            let vault = ledger.params().vault_address;
            ledger.ports().stablecoin.approve(owner, vault, amount)
        })
        .await?;
        tracing::debug!(%owner, amount, "vault allowance set");
        Ok(())
    }

    /// Token balance of `who` and the allowance they granted the vault.
    pub async fn token_position(&self, who: Address) -> (u128, u128) {
        self.read(|ledger| {
            let token = &ledger.ports().stablecoin;
            let vault = ledger.params().vault_address;
            (token.balance_of(who), token.allowance(who, vault))
        })
        .await
    }

    /// Credits dev funds to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput::InvalidRequest`] if the faucet is disabled
    /// or no in-memory token is attached.
    pub fn fund(&self, to: Address, amount: u128) -> Result<(), VaultError> {
        let token = match &self.channels {
            Some(channels) if self.faucet_enabled => &channels.stablecoin,
            _ => {
                return Err(MalformedInput::InvalidRequest("faucet is disabled".to_string()).into());
            }
        };
        if amount == 0 {
            return Err(MalformedInput::ZeroAmount("amount").into());
        }
        token.mint(to, amount);
        tracing::info!(%to, amount, "faucet funded account");
        Ok(())
    }

    /// Messages dispatched through the in-memory messenger.
    #[must_use]
    pub fn outbound_messages(&self) -> Vec<OutboundMessage> {
        self.channels
            .as_ref()
            .map(|c| c.messenger.sent())
            .unwrap_or_default()
    }

    /// Transfers dispatched through the in-memory bridge.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.channels
            .as_ref()
            .map(|c| c.transfer.transfers())
            .unwrap_or_default()
    }

    // ── persistence ────────────────────────────────────────────────────

    /// Writes a snapshot of the current state; `None` without persistence.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn save_snapshot(&self) -> Result<Option<i64>, VaultError> {
        let Some(persistence) = &self.persistence else {
            return Ok(None);
        };
        let state = self.state().await;
        let id = persistence.save_snapshot(&state).await?;
        tracing::debug!(snapshot_id = id, "ledger snapshot saved");
        Ok(Some(id))
    }

    /// Deletes snapshots older than `days`; `0` without persistence.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn prune_snapshots(&self, days: u64) -> Result<u64, VaultError> {
        match &self.persistence {
            Some(persistence) if days > 0 => persistence.delete_old_snapshots(days).await,
            _ => Ok(0),
        }
    }
}
