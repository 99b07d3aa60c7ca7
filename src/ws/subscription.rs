//! Per-connection subscription manager.
//!
//! Tracks which topics a WebSocket client follows and provides
//! server-side event filtering. A topic is a domain id, `"vault"` for
//! vault-wide events that concern no domain, or `"*"` for everything.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::{DomainId, VaultEvent};

/// A subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every event.
    All,
    /// Events that concern no particular domain.
    Vault,
    /// Events touching one domain.
    Domain(DomainId),
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(Self::All),
            "vault" => Ok(Self::Vault),
            other => other
                .parse::<DomainId>()
                .map(Self::Domain)
                .map_err(|_| format!("unknown topic: {other}")),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Vault => write!(f, "vault"),
            Self::Domain(id) => write!(f, "{id}"),
        }
    }
}

/// Manages the set of subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed domains. Ignored while `subscribe_all` is set.
    domains: HashSet<DomainId>,
    /// Whether vault-wide events are forwarded.
    vault: bool,
    /// Wildcard `"*"`.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds topics to the subscription set.
    pub fn subscribe(&mut self, topics: &[Topic]) {
        for topic in topics {
            match topic {
                Topic::All => self.subscribe_all = true,
                Topic::Vault => self.vault = true,
                Topic::Domain(id) => {
                    self.domains.insert(*id);
                }
            }
        }
    }

    /// Removes topics from the subscription set.
    pub fn unsubscribe(&mut self, topics: &[Topic]) {
        for topic in topics {
            match topic {
                Topic::All => self.subscribe_all = false,
                Topic::Vault => self.vault = false,
                Topic::Domain(id) => {
                    self.domains.remove(id);
                }
            }
        }
    }

    /// Returns `true` if the event passes the subscription filter.
    #[must_use]
    pub fn matches(&self, event: &VaultEvent) -> bool {
        if self.subscribe_all {
            return true;
        }
        let domains = event.domains();
        if domains.is_empty() {
            self.vault
        } else {
            domains.iter().any(|d| self.domains.contains(d))
        }
    }

    /// Returns the number of explicitly subscribed domains.
    #[must_use]
    pub fn count(&self) -> usize {
        self.domains.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }

    /// Returns `true` if vault-wide events are forwarded.
    #[must_use]
    pub fn is_subscribed_vault(&self) -> bool {
        self.vault
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::Address;

    fn registered(id: u32) -> VaultEvent {
        VaultEvent::DomainRegistered {
            domain_id: DomainId::new(id),
            vault_address: Address::repeat_byte(1),
            reactivated: false,
            timestamp: Utc::now(),
        }
    }

    fn paused() -> VaultEvent {
        VaultEvent::Paused {
            by: Address::repeat_byte(2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn topics_parse() {
        assert_eq!("*".parse::<Topic>().ok(), Some(Topic::All));
        assert_eq!("vault".parse::<Topic>().ok(), Some(Topic::Vault));
        assert_eq!(
            " 10 ".parse::<Topic>().ok(),
            Some(Topic::Domain(DomainId::new(10)))
        );
        assert!("mars".parse::<Topic>().is_err());
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&registered(10)));
        assert!(!mgr.matches(&paused()));
    }

    #[test]
    fn domain_subscription_filters_by_domain() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Topic::Domain(DomainId::new(10))]);
        assert!(mgr.matches(&registered(10)));
        assert!(!mgr.matches(&registered(42161)));
        assert!(!mgr.matches(&paused()));
    }

    #[test]
    fn reallocation_matches_either_side() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Topic::Domain(DomainId::new(8453))]);
        let event = VaultEvent::CapitalReallocated {
            from: DomainId::new(10),
            to: DomainId::new(8453),
            amount: "100".to_string(),
            timestamp: Utc::now(),
        };
        assert!(mgr.matches(&event));
    }

    #[test]
    fn vault_topic_matches_domainless_events() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Topic::Vault]);
        assert!(mgr.matches(&paused()));
        assert!(!mgr.matches(&registered(10)));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Topic::All]);
        assert!(mgr.matches(&registered(10)));
        assert!(mgr.matches(&paused()));
        mgr.unsubscribe(&[Topic::All]);
        assert!(!mgr.matches(&paused()));
    }

    #[test]
    fn unsubscribe_removes_domain() {
        let mut mgr = SubscriptionManager::new();
        let id = DomainId::new(10);
        mgr.subscribe(&[Topic::Domain(id), Topic::Domain(DomainId::new(11))]);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[Topic::Domain(id)]);
        assert!(!mgr.matches(&registered(10)));
        assert_eq!(mgr.count(), 1);
    }
}
