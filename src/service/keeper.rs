//! Keeper: periodic health checks, rebalances, fee collection and snapshots.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Interval, MissedTickBehavior};

use super::VaultService;
use crate::config::VaultConfig;
use crate::domain::Address;
use crate::engine::{Enforcement, FeeCollection, HealthMonitor, RebalanceOutcome};
use crate::error::VaultError;

/// Tick periods; `None` disables a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperSchedule {
    /// Health check period.
    pub health: Option<Duration>,
    /// Automatic rebalance period.
    pub rebalance: Option<Duration>,
    /// Fee collection period.
    pub fees: Option<Duration>,
    /// Snapshot period.
    pub snapshot: Option<Duration>,
    /// Snapshot retention in days (0 keeps everything).
    pub retention_days: u64,
}

fn period(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl KeeperSchedule {
    /// Derives the schedule from configuration. Snapshots run only with
    /// persistence enabled.
    #[must_use]
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            health: period(config.health_interval_secs),
            rebalance: period(config.rebalance_interval_secs),
            fees: period(config.fee_interval_secs),
            snapshot: if config.persistence_enabled {
                period(config.snapshot_interval_secs)
            } else {
                None
            },
            retention_days: config.cleanup_after_days,
        }
    }
}

/// Background task acting on the vault as a Pauser/Rebalancer identity.
#[derive(Debug)]
pub struct Keeper {
    service: Arc<VaultService>,
    monitor: HealthMonitor,
    schedule: KeeperSchedule,
}

fn ticker(every: Option<Duration>) -> Option<Interval> {
    every.map(|d| {
        let mut interval = tokio::time::interval(d);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

/// Paused or cooling-down ledgers are routine for a keeper.
fn is_routine(error: &VaultError) -> bool {
    matches!(error, VaultError::State(_))
}

impl Keeper {
    /// Creates a keeper. `monitor.identity()` is also the rebalancer
    /// identity.
    #[must_use]
    pub fn new(service: Arc<VaultService>, monitor: HealthMonitor, schedule: KeeperSchedule) -> Self {
        Self {
            service,
            monitor,
            schedule,
        }
    }

    /// Identity the keeper acts as.
    #[must_use]
    pub const fn identity(&self) -> Address {
        self.monitor.identity()
    }

    /// One health pass.
    ///
    /// # Errors
    ///
    /// See [`VaultService::enforce_health`].
    pub async fn check_health(&self) -> Result<Enforcement, VaultError> {
        self.service.enforce_health(&self.monitor).await
    }

    /// One rebalance pass.
    ///
    /// # Errors
    ///
    /// See [`VaultService::rebalance`].
    pub async fn rebalance(&self) -> Result<RebalanceOutcome, VaultError> {
        self.service.rebalance(self.identity()).await
    }

    /// One fee collection pass.
    ///
    /// # Errors
    ///
    /// See [`VaultService::collect_fees`].
    pub async fn collect_fees(&self) -> Result<FeeCollection, VaultError> {
        self.service.collect_fees().await
    }

    /// Saves a snapshot and prunes old ones.
    ///
    /// # Errors
    ///
    /// Returns a [`VaultError::Persistence`] on database failure.
    pub async fn snapshot(&self) -> Result<Option<i64>, VaultError> {
        let id = self.service.save_snapshot().await?;
        let pruned = self
            .service
            .prune_snapshots(self.schedule.retention_days)
            .await?;
        if pruned > 0 {
            tracing::info!(pruned, "old snapshots deleted");
        }
        Ok(id)
    }

    fn report(task: &'static str, result: Result<(), VaultError>) {
        match result {
            Ok(()) => {}
            Err(e) if is_routine(&e) => tracing::debug!(task, error = %e, "keeper pass skipped"),
            Err(e) => tracing::warn!(task, error = %e, "keeper pass failed"),
        }
    }

    /// Runs every enabled loop until `shutdown` fires, then writes a final
    /// snapshot.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(identity = %self.identity(), schedule = ?self.schedule, "keeper starting");

        let mut health = ticker(self.schedule.health);
        let mut rebalance = ticker(self.schedule.rebalance);
        let mut fees = ticker(self.schedule.fees);
        let mut snapshot = ticker(self.schedule.snapshot);

        loop {
            tokio::select! {
                () = tick(&mut health) => {
                    Self::report("health", self.check_health().await.map(|_| ()));
                }
                () = tick(&mut rebalance) => {
                    Self::report("rebalance", self.rebalance().await.map(|_| ()));
                }
                () = tick(&mut fees) => {
                    Self::report("fees", self.collect_fees().await.map(|_| ()));
                }
                () = tick(&mut snapshot) => {
                    Self::report("snapshot", self.snapshot().await.map(|_| ()));
                }
                _ = shutdown.recv() => {
                    tracing::info!("keeper: shutdown signal received");
                    if self.schedule.snapshot.is_some() {
                        Self::report("snapshot", self.snapshot().await.map(|_| ()));
                    }
                    break;
                }
            }
        }

        tracing::info!("keeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_disables_loop() {
        let config = VaultConfig {
            rebalance_interval_secs: 0,
            persistence_enabled: false,
            ..VaultConfig::default()
        };
        let schedule = KeeperSchedule::from_config(&config);
        assert_eq!(schedule.rebalance, None);
        assert_eq!(schedule.snapshot, None);
        assert_eq!(schedule.health, Some(Duration::from_secs(30)));
    }

    #[test]
    fn snapshots_follow_persistence() {
        let config = VaultConfig {
            persistence_enabled: true,
            ..VaultConfig::default()
        };
        let schedule = KeeperSchedule::from_config(&config);
        assert_eq!(schedule.snapshot, Some(Duration::from_secs(60)));
    }
}
