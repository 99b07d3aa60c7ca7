//! Startup wiring: restore the ledger from the latest snapshot or run a
//! fresh genesis against the in-memory channels.

use super::{LocalChannels, VaultService};
use crate::channel::Stablecoin;
use crate::config::VaultConfig;
use crate::domain::EventBus;
use crate::engine::{Ledger, Role};
use crate::error::VaultError;
use crate::persistence::PostgresPersistence;

/// Builds a ready-to-serve [`VaultService`].
///
/// With persistence attached and a snapshot on disk the ledger is restored
/// as-is, and the in-memory token is credited with the restored idle buffer
/// so withdrawals can be paid. Otherwise the admin is funded with the seed,
/// genesis runs, the keeper receives Pauser and Rebalancer, and the admin
/// also receives Manager.
///
/// # Errors
///
/// Fails if the snapshot cannot be loaded or restored, or if genesis is
/// rejected.
pub async fn bootstrap(
    config: &VaultConfig,
    persistence: Option<PostgresPersistence>,
) -> Result<VaultService, VaultError> {
    let channels = LocalChannels::new(config.transfer_routes.clone(), config.message_base_fee);

    let snapshot = match &persistence {
        Some(p) => p.load_latest_snapshot().await?,
        None => None,
    };

    let restored = snapshot.is_some();
    let ledger = match snapshot {
        Some(snapshot) => {
            let vault = snapshot.state.params.vault_address;
            channels.stablecoin.mint(vault, snapshot.state.idle_buffer);
            tracing::info!(
                snapshot_id = snapshot.id,
                snapshot_at = %snapshot.snapshot_at,
                status = %snapshot.state.status,
                domains = snapshot.state.registry.len(),
                "restoring ledger from snapshot"
            );
            Ledger::restore(snapshot.state, channels.ports())?
        }
        None => Ledger::new(config.ledger.clone(), channels.ports())?,
    };

    let mut service = VaultService::new(ledger, EventBus::new(config.event_bus_capacity))
        .with_channels(channels.clone())
        .with_faucet(config.faucet_enabled);
    if let Some(p) = persistence {
        service = service.with_persistence(p, config.event_log_enabled);
    }

    if !restored {
        genesis(&service, &channels, config).await?;
    }
    Ok(service)
}

async fn genesis(
    service: &VaultService,
    channels: &LocalChannels,
    config: &VaultConfig,
) -> Result<(), VaultError> {
    let admin = config.admin_address;
    let keeper = config.keeper_address;
    let seed = config.ledger.seed_amount;

    channels.stablecoin.mint(admin, seed);
    channels
        .stablecoin
        .approve(admin, config.ledger.vault_address, seed)?;
    service.initialize(admin).await?;

    service.grant_role(admin, admin, Role::Manager).await?;
    service.grant_role(admin, keeper, Role::Pauser).await?;
    service.grant_role(admin, keeper, Role::Rebalancer).await?;

    tracing::info!(%admin, %keeper, seed, "genesis complete");
    Ok(())
}
