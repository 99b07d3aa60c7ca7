//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::engine::HealthMonitor;
use crate::service::VaultService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Vault service for all business logic.
    pub vault_service: Arc<VaultService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Read-only health inspector for `GET /health/vault`.
    pub monitor: HealthMonitor,
}

impl AppState {
    /// Wires state around `vault_service`, sharing its event bus.
    #[must_use]
    pub fn new(vault_service: Arc<VaultService>, monitor: HealthMonitor) -> Self {
        let event_bus = vault_service.event_bus().clone();
        Self {
            vault_service,
            event_bus,
            monitor,
        }
    }
}
