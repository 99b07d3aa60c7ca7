//! Channel layer: the external collaborators the ledger consumes.
//!
//! - [`AssetTransferChannel`] moves pooled value to a remote domain.
//! - [`MessageChannel`] carries [`CrossDomainMessage`] payloads; its inbound
//!   side is [`crate::engine::Ledger::handle_incoming_message`].
//! - [`Stablecoin`] is the fungible token users deposit.
//!
//! Each trait ships with an in-memory implementation used by the gateway
//! binary and by tests. Real bridge and messenger adapters plug in behind the
//! same traits.

pub mod message;
pub mod payload;
pub mod stablecoin;
pub mod transfer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Address, DomainId};

pub use message::{InMemoryMessageChannel, InboundMessage, MessageChannel, OutboundMessage};
pub use payload::CrossDomainMessage;
pub use stablecoin::{InMemoryStablecoin, Stablecoin};
pub use transfer::{
    AssetTransferChannel, InMemoryTransferChannel, Route, RouteTable, TransferRecord,
};

/// Failure reported by an external channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Channel could not be reached or refused service.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// No route to the destination domain is configured.
    #[error("no route to domain {0}")]
    NoRoute(DomainId),

    /// Token balance too low.
    #[error("insufficient token balance for {holder}: needed {needed}, have {available}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Amount required.
        needed: u128,
        /// Amount held.
        available: u128,
    },

    /// Token allowance too low.
    #[error("insufficient allowance from {owner} to {spender}: needed {needed}, have {available}")]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Spender.
        spender: Address,
        /// Amount required.
        needed: u128,
        /// Amount approved.
        available: u128,
    },
}

/// Identifier returned by [`AssetTransferChannel::transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(uuid::Uuid);

impl TransferId {
    /// Creates a new random `TransferId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for TransferId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier returned by [`MessageChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    /// Creates a new random `MessageId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
