//! # meridian-vault
//!
//! Cross-domain stablecoin yield vault with a REST and WebSocket gateway.
//!
//! Users deposit a stablecoin on the hub domain and receive vault shares.
//! A reserve of the deposits stays idle as a withdrawal buffer; the rest
//! is deployed to child vaults on remote domains through a token transfer
//! channel, and those vaults report yield and balances back over a
//! message channel. A rebalancer moves capital toward the best-yielding
//! fresh domain, a management fee accrues over time, and a health monitor
//! trips the emergency pause on anomalies.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)          Keeper (interval tasks)
//!     │                                  │
//!     ├── REST Handlers (api/)           │
//!     ├── WS Handler (ws/)               │
//!     │                                  │
//!     ├── VaultService (service/) ◄──────┘
//!     ├── EventBus (domain/)
//!     │
//!     ├── Ledger (engine/)
//!     │     ├── ShareLedger · FeeState · AccessControl
//!     │     ├── DomainRegistry (domain/)
//!     │     └── Rebalancer · HealthMonitor
//!     │
//!     ├── Stablecoin · TransferChannel · MessageChannel (channel/)
//!     │
//!     └── PostgreSQL Persistence
//! ```

pub mod api;
pub mod app_state;
pub mod channel;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
