//! System endpoints: liveness and vault health.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::EventBus;
use crate::engine::{Anomaly, HealthReport};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// One detected anomaly.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnomalyDto {
    /// `stale_report`, `buffer_breach` or `invariant_violation`.
    pub kind: String,
    /// Affected domain for stale reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<u32>,
    /// Human-readable detail.
    pub detail: String,
}

impl From<&Anomaly> for AnomalyDto {
    fn from(anomaly: &Anomaly) -> Self {
        let (domain_id, detail) = match anomaly {
            Anomaly::StaleReport {
                domain_id,
                last_report_time,
                age_secs,
            } => (
                Some(domain_id.get()),
                last_report_time.map_or_else(
                    || format!("no report since registration {age_secs}s ago"),
                    |t| format!("last report at {} ({age_secs}s ago)", t.to_rfc3339()),
                ),
            ),
            Anomaly::BufferBreach { buffer, required } => {
                (None, format!("idle buffer {buffer} below reserve {required}"))
            }
            Anomaly::InvariantViolation { detail } => (None, detail.clone()),
        };
        Self {
            kind: anomaly.kind().to_string(),
            domain_id,
            detail,
        }
    }
}

/// Vault health assessment.
#[derive(Debug, Serialize, ToSchema)]
pub struct VaultHealthResponse {
    /// `true` when no anomaly was found.
    pub healthy: bool,
    /// Ledger status.
    pub status: String,
    /// Assessment time.
    pub checked_at: DateTime<Utc>,
    /// Anomalies found.
    pub anomalies: Vec<AnomalyDto>,
    /// Events broadcast since startup.
    pub events_published: u64,
    /// Open event subscriptions.
    pub subscribers: usize,
}

impl VaultHealthResponse {
    /// Combines a health report with event bus counters.
    #[must_use]
    pub fn new(report: &HealthReport, bus: &EventBus) -> Self {
        Self {
            healthy: report.is_healthy(),
            status: report.status.to_string(),
            checked_at: report.checked_at,
            anomalies: report.anomalies.iter().map(AnomalyDto::from).collect(),
            events_published: bus.published(),
            subscribers: bus.receiver_count(),
        }
    }
}

/// `GET /health/vault` — Ledger health without side effects.
#[utoipa::path(
    get,
    path = "/health/vault",
    tag = "System",
    summary = "Vault health",
    description = "Runs the health monitor's checks and reports anomalies. Never pauses the vault; the keeper does that.",
    responses(
        (status = 200, description = "Assessment", body = VaultHealthResponse),
    )
)]
pub async fn vault_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.vault_service.health_report(&state.monitor).await;
    Json(VaultHealthResponse::new(&report, &state.event_bus))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/vault", get(vault_health_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainId;
    use crate::engine::LedgerStatus;

    #[test]
    fn stale_report_carries_domain() {
        let anomaly = Anomaly::StaleReport {
            domain_id: DomainId::new(42161),
            last_report_time: None,
            age_secs: 90_000,
        };
        let dto = AnomalyDto::from(&anomaly);
        assert_eq!(dto.kind, "stale_report");
        assert_eq!(dto.domain_id, Some(42161));
        assert!(dto.detail.contains("90000s"));
    }

    #[test]
    fn empty_report_is_healthy() {
        let report = HealthReport {
            checked_at: Utc::now(),
            status: LedgerStatus::Active,
            anomalies: Vec::new(),
        };
        let dto = VaultHealthResponse::new(&report, &EventBus::new(8));
        assert!(dto.healthy);
        assert_eq!(dto.status, "active");
        assert_eq!(dto.events_published, 0);
        assert_eq!(dto.subscribers, 0);
    }
}
