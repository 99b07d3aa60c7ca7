//! Service layer: business logic orchestration.
//!
//! [`VaultService`] serializes access to the [`crate::engine::Ledger`],
//! stamps operations with the wall clock and publishes committed events
//! through the [`super::domain::EventBus`]. [`Keeper`] drives the periodic
//! work; [`bootstrap`] assembles everything at startup.

pub mod bootstrap;
pub mod channels;
pub mod keeper;
pub mod vault_service;

pub use bootstrap::bootstrap;
pub use channels::LocalChannels;
pub use keeper::{Keeper, KeeperSchedule};
pub use vault_service::VaultService;
