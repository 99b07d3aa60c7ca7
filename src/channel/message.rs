//! Message channel: delivers payloads between the vault and remote domains.
//!
//! Outbound messages go through [`MessageChannel::send`]. Inbound delivery is
//! driven by external infrastructure and arrives as an [`InboundMessage`],
//! which the ledger verifies against the domain registry before acting on.
//! Delivery is at-least-once and unordered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{ChannelError, MessageId};
use crate::domain::{Address, DomainId};

/// Outbound cross-domain messenger.
pub trait MessageChannel: Send + Sync + std::fmt::Debug {
    /// Dispatches `payload` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] if the message was not dispatched.
    fn send(&self, destination: DomainId, payload: &[u8]) -> Result<MessageId, ChannelError>;

    /// Quotes the delivery fee for one message to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] if the destination is unreachable.
    fn estimate_fee(&self, destination: DomainId) -> Result<u128, ChannelError>;
}

/// A message delivered to the vault by the messaging infrastructure.
///
/// `origin` and `sender` are asserted by the channel and are untrusted until
/// checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Domain the message claims to come from.
    pub origin: DomainId,
    /// Address the message claims to be sent by.
    pub sender: Address,
    /// Encoded [`super::CrossDomainMessage`].
    pub payload: Vec<u8>,
}

/// A dispatched message as recorded by [`InMemoryMessageChannel`].
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    /// Channel-assigned identifier.
    pub message_id: MessageId,
    /// Destination domain.
    pub destination: DomainId,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// Fee quoted at dispatch.
    pub fee: u128,
    /// Dispatch timestamp.
    pub sent_at: DateTime<Utc>,
}

/// In-process messenger with a flat per-message fee and an outbox.
#[derive(Debug, Default)]
pub struct InMemoryMessageChannel {
    base_fee: u128,
    fee_overrides: HashMap<DomainId, u128>,
    outbox: Mutex<Vec<OutboundMessage>>,
    failures: AtomicUsize,
}

impl InMemoryMessageChannel {
    /// Creates a messenger charging `base_fee` per message.
    #[must_use]
    pub fn new(base_fee: u128) -> Self {
        Self {
            base_fee,
            ..Self::default()
        }
    }

    /// Overrides the fee for one destination.
    #[must_use]
    pub fn with_fee(mut self, destination: DomainId, fee: u128) -> Self {
        self.fee_overrides.insert(destination, fee);
        self
    }

    /// Makes the next `n` sends fail with [`ChannelError::Unavailable`].
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Snapshot of every dispatched message.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().clone()
    }

    /// Removes and returns every dispatched message.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.outbox.lock())
    }
}

impl MessageChannel for InMemoryMessageChannel {
    fn send(&self, destination: DomainId, payload: &[u8]) -> Result<MessageId, ChannelError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ChannelError::Unavailable("injected message failure".into()));
        }
        let fee = self.estimate_fee(destination)?;
        let message_id = MessageId::new();
        tracing::debug!(%message_id, %destination, bytes = payload.len(), "message dispatched");
        self.outbox.lock().push(OutboundMessage {
            message_id,
            destination,
            payload: payload.to_vec(),
            fee,
            sent_at: Utc::now(),
        });
        Ok(message_id)
    }

    fn estimate_fee(&self, destination: DomainId) -> Result<u128, ChannelError> {
        Ok(self
            .fee_overrides
            .get(&destination)
            .copied()
            .unwrap_or(self.base_fee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_records_message_with_fee() {
        let channel = InMemoryMessageChannel::new(10).with_fee(DomainId::new(2), 25);
        assert!(channel.send(DomainId::new(1), b"a").is_ok());
        assert!(channel.send(DomainId::new(2), b"b").is_ok());
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent.first().map(|m| m.fee), Some(10));
        assert_eq!(sent.get(1).map(|m| m.fee), Some(25));
    }

    #[test]
    fn drain_empties_outbox() {
        let channel = InMemoryMessageChannel::new(0);
        let _ = channel.send(DomainId::new(1), b"x");
        assert_eq!(channel.drain().len(), 1);
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn injected_failure_sends_nothing() {
        let channel = InMemoryMessageChannel::new(0);
        channel.fail_next(1);
        assert!(channel.send(DomainId::new(1), b"x").is_err());
        assert!(channel.sent().is_empty());
    }
}
