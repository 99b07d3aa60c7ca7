//! Domain layer: core types, the domain registry and the event system.
//!
//! This module contains the vault's model of the outside world: domain
//! identity, account addresses, per-domain allocation records, the indexed
//! registry of those records, and the events broadcast after every state
//! change.

pub mod address;
pub mod domain_id;
pub mod domain_record;
pub mod domain_registry;
pub mod event_bus;
pub mod vault_event;

pub use address::{Address, AddressParseError};
pub use domain_id::DomainId;
pub use domain_record::{DomainRecord, DomainStatus, DomainSummary};
pub use domain_registry::DomainRegistry;
pub use event_bus::EventBus;
pub use vault_event::VaultEvent;
