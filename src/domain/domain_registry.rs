//! Indexed table of domain records.
//!
//! [`DomainRegistry`] is a plain `BTreeMap` keyed by [`DomainId`]: explicit
//! lookups, deterministic iteration order, no shared references into the
//! table. Only the ledger mutates it; everything else gets read accessors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain_record::{DomainRecord, DomainStatus};
use super::{Address, DomainId};
use crate::error::{PolicyViolation, VaultError};

/// Registry of every domain ever registered with the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRegistry {
    records: BTreeMap<DomainId, DomainRecord>,
}

impl DomainRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `domain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DomainNotFound`] if the domain was never
    /// registered.
    pub fn get(&self, domain_id: DomainId) -> Result<&DomainRecord, VaultError> {
        self.records
            .get(&domain_id)
            .ok_or(VaultError::DomainNotFound(domain_id))
    }

    /// Returns the record for `domain_id` only if it is active.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DomainNotFound`] for unknown domains and
    /// [`PolicyViolation::DomainInactive`] for retired ones.
    pub fn get_active(&self, domain_id: DomainId) -> Result<&DomainRecord, VaultError> {
        let record = self.get(domain_id)?;
        if !record.is_active() {
            return Err(PolicyViolation::DomainInactive(domain_id).into());
        }
        Ok(record)
    }

    /// Iterates over all records in domain-id order.
    pub fn all(&self) -> impl Iterator<Item = &DomainRecord> {
        self.records.values()
    }

    /// Iterates over active records in domain-id order.
    pub fn active(&self) -> impl Iterator<Item = &DomainRecord> {
        self.records.values().filter(|r| r.is_active())
    }

    /// Sum of `deployed_amount` across every record, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] if the sum overflows.
    pub fn total_deployed(&self) -> Result<u128, VaultError> {
        self.records.values().try_fold(0u128, |acc, r| {
            acc.checked_add(r.deployed_amount)
                .ok_or(VaultError::ArithmeticOverflow)
        })
    }

    /// Number of registered domains, including inactive ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no domain was ever registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registers `domain_id` or reactivates a retired record.
    ///
    /// Reactivation keeps the existing deployment and report history and
    /// only replaces the vault address.
    pub(crate) fn register(
        &mut self,
        domain_id: DomainId,
        vault_address: Address,
        now: DateTime<Utc>,
    ) -> Result<&DomainRecord, VaultError> {
        if self.records.get(&domain_id).is_some_and(DomainRecord::is_active) {
            return Err(PolicyViolation::DomainAlreadyActive(domain_id).into());
        }
        let record = self
            .records
            .entry(domain_id)
            .or_insert_with(|| DomainRecord::new(domain_id, vault_address, now));
        record.vault_address = vault_address;
        record.status = DomainStatus::Active;
        Ok(record)
    }

    /// Mutable access for ledger write paths.
    pub(crate) fn get_mut(&mut self, domain_id: DomainId) -> Result<&mut DomainRecord, VaultError> {
        self.records
            .get_mut(&domain_id)
            .ok_or(VaultError::DomainNotFound(domain_id))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let mut registry = DomainRegistry::new();
        let now = Utc::now();
        let Ok(record) = registry.register(DomainId::new(1), Address::repeat_byte(1), now) else {
            panic!("registration failed");
        };
        assert_eq!(record.domain_id, DomainId::new(1));
        assert!(registry.get(DomainId::new(1)).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_unknown_returns_not_found() {
        let registry = DomainRegistry::new();
        assert!(matches!(
            registry.get(DomainId::new(9)),
            Err(VaultError::DomainNotFound(_))
        ));
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = DomainRegistry::new();
        let now = Utc::now();
        let _ = registry.register(DomainId::new(1), Address::repeat_byte(1), now);
        let later = now + chrono::Duration::seconds(1);
        let result = registry.register(DomainId::new(1), Address::repeat_byte(2), later);
        assert!(matches!(
            result,
            Err(VaultError::Policy(PolicyViolation::DomainAlreadyActive(_)))
        ));
    }

    #[test]
    fn reactivation_keeps_history() {
        let mut registry = DomainRegistry::new();
        let now = Utc::now();
        let id = DomainId::new(1);
        let _ = registry.register(id, Address::repeat_byte(1), now);
        if let Ok(record) = registry.get_mut(id) {
            record.deployed_amount = 500;
            record.status = DomainStatus::Inactive;
        }
        assert!(registry.get_active(id).is_err());

        let later = now + chrono::Duration::seconds(10);
        let Ok(record) = registry.register(id, Address::repeat_byte(3), later) else {
            panic!("reactivation failed");
        };
        assert_eq!(record.deployed_amount, 500);
        assert_eq!(record.vault_address, Address::repeat_byte(3));
        assert_eq!(record.registered_at, now);
    }

    #[test]
    fn total_deployed_sums_all_records() {
        let mut registry = DomainRegistry::new();
        let now = Utc::now();
        for (id, amount) in [(1u32, 100u128), (2, 250)] {
            let _ = registry.register(DomainId::new(id), Address::repeat_byte(1), now);
            if let Ok(record) = registry.get_mut(DomainId::new(id)) {
                record.deployed_amount = amount;
            }
        }
        assert_eq!(registry.total_deployed().unwrap_or_default(), 350);
        assert_eq!(registry.active().count(), 2);
    }
}
