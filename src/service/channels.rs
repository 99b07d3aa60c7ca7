//! In-process channel bundle used by the gateway binary and tests.

use std::sync::Arc;

use crate::channel::{
    AssetTransferChannel, InMemoryMessageChannel, InMemoryStablecoin, InMemoryTransferChannel,
    MessageChannel, RouteTable, Stablecoin,
};
use crate::engine::Ports;

/// Concrete handles to the in-memory channels behind a ledger's [`Ports`].
///
/// Keeping the concrete types lets the service mint dev funds and expose
/// the outbound message log without downcasting.
#[derive(Debug, Clone)]
pub struct LocalChannels {
    /// Token ledger.
    pub stablecoin: Arc<InMemoryStablecoin>,
    /// Bridge.
    pub transfer: Arc<InMemoryTransferChannel>,
    /// Messenger.
    pub messenger: Arc<InMemoryMessageChannel>,
}

impl LocalChannels {
    /// Creates a fresh bundle.
    #[must_use]
    pub fn new(routes: RouteTable, message_base_fee: u128) -> Self {
        Self {
            stablecoin: Arc::new(InMemoryStablecoin::new()),
            transfer: Arc::new(InMemoryTransferChannel::new(routes)),
            messenger: Arc::new(InMemoryMessageChannel::new(message_base_fee)),
        }
    }

    /// Trait-object view for [`crate::engine::Ledger`].
    #[must_use]
    pub fn ports(&self) -> Ports {
        let stablecoin: Arc<dyn Stablecoin> = Arc::clone(&self.stablecoin) as Arc<dyn Stablecoin>;
        let transfer: Arc<dyn AssetTransferChannel> =
            Arc::clone(&self.transfer) as Arc<dyn AssetTransferChannel>;
        let messenger: Arc<dyn MessageChannel> =
            Arc::clone(&self.messenger) as Arc<dyn MessageChannel>;
        Ports::new(stablecoin, transfer, messenger)
    }
}

impl Default for LocalChannels {
    fn default() -> Self {
        Self::new(RouteTable::direct(), 0)
    }
}
