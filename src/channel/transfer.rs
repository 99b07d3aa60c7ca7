//! Asset transfer channel: moves pooled value to a remote domain.
//!
//! The origin-side debit is atomic with the call; arrival at the destination
//! is eventual and never observed synchronously. Confirmation reaches the
//! ledger only indirectly, through a later yield report.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::{ChannelError, TransferId};
use crate::domain::{Address, DomainId};

/// Outbound value bridge.
pub trait AssetTransferChannel: Send + Sync + std::fmt::Debug {
    /// Dispatches `amount` to `recipient` inside `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] if the transfer was not dispatched. A
    /// dispatched transfer cannot be cancelled.
    fn transfer(
        &self,
        amount: u128,
        destination: DomainId,
        recipient: Address,
    ) -> Result<TransferId, ChannelError>;
}

/// How value reaches a destination domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "hub")]
pub enum Route {
    /// Bridged straight to the destination.
    Direct,
    /// Bridged to an intermediate hub domain first, then forwarded.
    Via(DomainId),
}

/// Routing topology, supplied as configuration rather than hard-coded.
///
/// Parsed from a comma-separated list such as
/// `"42161:direct,8453:via:1"`. Domains without an entry use the default
/// route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<DomainId, Route>,
    default_route: Option<Route>,
}

impl RouteTable {
    /// A table routing every domain directly.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            routes: HashMap::new(),
            default_route: Some(Route::Direct),
        }
    }

    /// A table that only routes explicitly listed domains.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            routes: HashMap::new(),
            default_route: None,
        }
    }

    /// Adds or replaces the route for `domain`.
    #[must_use]
    pub fn with_route(mut self, domain: DomainId, route: Route) -> Self {
        self.routes.insert(domain, route);
        self
    }

    /// Resolves the hop sequence to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoRoute`] if neither an explicit nor a default
    /// route exists.
    pub fn hops(&self, destination: DomainId) -> Result<Vec<DomainId>, ChannelError> {
        match self.routes.get(&destination).copied().or(self.default_route) {
            Some(Route::Direct) => Ok(vec![destination]),
            Some(Route::Via(hub)) if hub == destination => Ok(vec![destination]),
            Some(Route::Via(hub)) => Ok(vec![hub, destination]),
            None => Err(ChannelError::NoRoute(destination)),
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::direct()
    }
}

impl FromStr for RouteTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = Self::direct();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let route = match parts.as_slice() {
                [domain, "direct"] => (domain.parse::<DomainId>(), Route::Direct),
                [domain, "via", hub] => {
                    let hub = hub
                        .parse::<DomainId>()
                        .map_err(|e| format!("invalid hub in {entry:?}: {e}"))?;
                    (domain.parse::<DomainId>(), Route::Via(hub))
                }
                _ => return Err(format!("invalid route entry {entry:?}")),
            };
            let (domain, route) = route;
            let domain = domain.map_err(|e| format!("invalid domain in {entry:?}: {e}"))?;
            table.routes.insert(domain, route);
        }
        Ok(table)
    }
}

/// A dispatched transfer as recorded by [`InMemoryTransferChannel`].
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    /// Channel-assigned identifier.
    pub transfer_id: TransferId,
    /// Amount dispatched.
    pub amount: u128,
    /// Final destination domain.
    pub destination: DomainId,
    /// Recipient inside the destination.
    pub recipient: Address,
    /// Domains traversed, ending with the destination.
    pub hops: Vec<DomainId>,
    /// Dispatch timestamp.
    pub dispatched_at: DateTime<Utc>,
}

/// In-process transfer channel that records every dispatch.
///
/// Supports failure injection so callers can verify all-or-nothing
/// behaviour around channel errors.
#[derive(Debug, Default)]
pub struct InMemoryTransferChannel {
    routes: RouteTable,
    log: Mutex<Vec<TransferRecord>>,
    failures: AtomicUsize,
}

impl InMemoryTransferChannel {
    /// Creates a channel routing according to `routes`.
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            log: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `n` transfers fail with [`ChannelError::Unavailable`].
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Snapshot of every dispatched transfer.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.log.lock().clone()
    }

    /// Sum dispatched to `destination`.
    #[must_use]
    pub fn total_sent_to(&self, destination: DomainId) -> u128 {
        self.log
            .lock()
            .iter()
            .filter(|t| t.destination == destination)
            .map(|t| t.amount)
            .sum()
    }
}

impl AssetTransferChannel for InMemoryTransferChannel {
    fn transfer(
        &self,
        amount: u128,
        destination: DomainId,
        recipient: Address,
    ) -> Result<TransferId, ChannelError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ChannelError::Unavailable("injected transfer failure".into()));
        }
        let hops = self.routes.hops(destination)?;
        let transfer_id = TransferId::new();
        tracing::debug!(%transfer_id, %destination, amount, hops = hops.len(), "transfer dispatched");
        self.log.lock().push(TransferRecord {
            transfer_id,
            amount,
            destination,
            recipient,
            hops,
            dispatched_at: Utc::now(),
        });
        Ok(transfer_id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_table() {
        let Ok(table) = "42161:direct, 8453:via:1".parse::<RouteTable>() else {
            panic!("valid routes");
        };
        assert_eq!(table.hops(DomainId::new(42161)), Ok(vec![DomainId::new(42161)]));
        assert_eq!(
            table.hops(DomainId::new(8453)),
            Ok(vec![DomainId::new(1), DomainId::new(8453)])
        );
        assert_eq!(table.hops(DomainId::new(10)), Ok(vec![DomainId::new(10)]));
    }

    #[test]
    fn rejects_bad_route_entries() {
        assert!("42161".parse::<RouteTable>().is_err());
        assert!("x:direct".parse::<RouteTable>().is_err());
        assert!("1:via:hub".parse::<RouteTable>().is_err());
    }

    #[test]
    fn strict_table_refuses_unknown_destinations() {
        let table = RouteTable::strict().with_route(DomainId::new(5), Route::Direct);
        assert!(table.hops(DomainId::new(5)).is_ok());
        assert_eq!(
            table.hops(DomainId::new(6)),
            Err(ChannelError::NoRoute(DomainId::new(6)))
        );
    }

    #[test]
    fn records_transfers() {
        let channel = InMemoryTransferChannel::new(RouteTable::direct());
        let result = channel.transfer(500, DomainId::new(2), Address::repeat_byte(2));
        assert!(result.is_ok());
        assert_eq!(channel.transfers().len(), 1);
        assert_eq!(channel.total_sent_to(DomainId::new(2)), 500);
    }

    #[test]
    fn injected_failures_are_consumed() {
        let channel = InMemoryTransferChannel::new(RouteTable::direct());
        channel.fail_next(1);
        assert!(channel.transfer(1, DomainId::new(2), Address::ZERO).is_err());
        assert!(channel.transfer(1, DomainId::new(2), Address::ZERO).is_ok());
        assert_eq!(channel.transfers().len(), 1);
    }
}
