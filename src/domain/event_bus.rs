//! Fan-out of committed vault events.
//!
//! A ledger operation commits its [`VaultEvent`]s as one batch. The bus
//! forwards each batch over a [`tokio::sync::broadcast`] channel, in order,
//! and numbers every event it accepts so operators can see how many have
//! gone out since startup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::VaultEvent;

/// Broadcast bus for committed [`VaultEvent`]s.
///
/// Lagging receivers lose the oldest events once the ring buffer of
/// `capacity` entries fills up; the sequence counter still advances.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VaultEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Broadcasts one committed batch in order.
    ///
    /// Returns the sequence number of the last event in the batch, or the
    /// current sequence for an empty batch. Events are counted even when
    /// no receiver is listening.
    pub fn publish_batch(&self, events: impl IntoIterator<Item = VaultEvent>) -> u64 {
        let mut last = self.sequence.load(Ordering::Acquire);
        for event in events {
            last = self.sequence.fetch_add(1, Ordering::AcqRel).saturating_add(1);
            let event_type = event.event_type_str();
            if self.sender.send(event).is_err() {
                tracing::trace!(seq = last, event_type, "no subscribers for event");
            }
        }
        last
    }

    /// Total events accepted since the bus was created.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.sender.subscribe()
    }

    /// Live receivers, one per open WebSocket connection.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{Address, DomainId};

    fn registered(id: u32) -> VaultEvent {
        VaultEvent::DomainRegistered {
            domain_id: DomainId::new(id),
            vault_address: Address::repeat_byte(7),
            reactivated: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn batches_are_numbered_without_receivers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish_batch(Vec::new()), 0);
        assert_eq!(bus.publish_batch([registered(1), registered(2)]), 2);
        assert_eq!(bus.publish_batch([registered(3)]), 3);
        assert_eq!(bus.published(), 3);
    }

    #[tokio::test]
    async fn batch_arrives_in_commit_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish_batch([registered(10), registered(8453)]);

        let (Ok(first), Ok(second)) = (rx.recv().await, rx.recv().await) else {
            panic!("both events should arrive");
        };
        assert_eq!(first.domain_id(), Some(DomainId::new(10)));
        assert_eq!(second.domain_id(), Some(DomainId::new(8453)));
    }

    #[tokio::test]
    async fn clones_share_one_channel() {
        let bus = EventBus::new(16);
        let mirror = bus.clone();
        let mut rx = mirror.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        bus.publish_batch([registered(5)]);

        let Ok(event) = rx.recv().await else {
            panic!("clone should see the event");
        };
        assert_eq!(event.event_type_str(), "domain_registered");
        assert_eq!(mirror.published(), 1);
    }
}
