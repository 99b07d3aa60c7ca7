//! Administration handlers: emergency pause, roles and policy parameters.

use std::str::FromStr;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};

use super::caller;
use crate::api::dto::{AckResponse, ParamsUpdateRequest, RoleRequest, parse_address, parse_amount};
use crate::app_state::AppState;
use crate::engine::{RebalancePolicy, Role};
use crate::error::{ErrorResponse, VaultError};

/// `POST /admin/pause` — Emergency pause (Pauser or Admin).
///
/// # Errors
///
/// Returns [`VaultError`] if already paused or the caller lacks the role.
#[utoipa::path(
    post,
    path = "/api/v1/admin/pause",
    tag = "Admin",
    summary = "Emergency pause",
    responses(
        (status = 200, description = "Vault paused", body = AckResponse),
        (status = 403, description = "Missing Pauser role", body = ErrorResponse),
        (status = 409, description = "Already paused", body = ErrorResponse),
    )
)]
pub async fn pause(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    state.vault_service.pause(caller).await?;
    Ok(Json(AckResponse::new("pause", true)))
}

/// `POST /admin/unpause` — Lift the pause (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] if not paused or the caller lacks Admin.
#[utoipa::path(
    post,
    path = "/api/v1/admin/unpause",
    tag = "Admin",
    summary = "Unpause",
    responses(
        (status = 200, description = "Vault active", body = AckResponse),
        (status = 409, description = "Not paused", body = ErrorResponse),
    )
)]
pub async fn unpause(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    state.vault_service.unpause(caller).await?;
    Ok(Json(AckResponse::new("unpause", true)))
}

/// `POST /admin/roles` — Grant a role (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] on an unknown role or missing Admin.
#[utoipa::path(
    post,
    path = "/api/v1/admin/roles",
    tag = "Admin",
    summary = "Grant a role",
    request_body = RoleRequest,
    responses(
        (status = 200, description = "`changed` is false if already held", body = AckResponse),
        (status = 400, description = "Unknown role", body = ErrorResponse),
    )
)]
pub async fn grant_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let account = parse_address(&req.account, "account")?;
    let role = Role::from_str(&req.role)?;
    let changed = state.vault_service.grant_role(caller, account, role).await?;
    Ok(Json(AckResponse::new("grant_role", changed)))
}

/// `POST /admin/roles/revoke` — Revoke a role (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] when revoking the last admin.
#[utoipa::path(
    post,
    path = "/api/v1/admin/roles/revoke",
    tag = "Admin",
    summary = "Revoke a role",
    request_body = RoleRequest,
    responses(
        (status = 200, description = "`changed` is false if not held", body = AckResponse),
        (status = 422, description = "Would remove the last admin", body = ErrorResponse),
    )
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let account = parse_address(&req.account, "account")?;
    let role = Role::from_str(&req.role)?;
    let changed = state.vault_service.revoke_role(caller, account, role).await?;
    Ok(Json(AckResponse::new("revoke_role", changed)))
}

/// `PUT /admin/params` — Update policy parameters (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] on the first rejected field.
#[utoipa::path(
    put,
    path = "/api/v1/admin/params",
    tag = "Admin",
    summary = "Update parameters",
    description = "Applies each present field in order. Each field is validated and committed on its own.",
    request_body = ParamsUpdateRequest,
    responses(
        (status = 200, description = "Parameters updated", body = AckResponse),
        (status = 422, description = "Invalid parameter", body = ErrorResponse),
    )
)]
pub async fn update_params(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ParamsUpdateRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let service = &state.vault_service;
    let mut changed = false;

    if let Some(raw) = req.deposit_cap.as_deref() {
        let cap = parse_amount(raw, "deposit_cap")?;
        service.set_deposit_cap(caller, cap).await?;
        changed = true;
    }
    if let Some(buffer_bps) = req.buffer_bps {
        service.set_buffer_bps(caller, buffer_bps).await?;
        changed = true;
    }
    if let Some(enabled) = req.buffer_management_enabled {
        service.set_buffer_management(caller, enabled).await?;
        changed = true;
    }
    if let Some(raw) = req.fee_recipient.as_deref() {
        let recipient = parse_address(raw, "fee_recipient")?;
        service.set_fee_recipient(caller, recipient).await?;
        changed = true;
    }
    if let Some(policy) = req.rebalance {
        let policy = RebalancePolicy {
            min_apy_diff_bps: policy.min_apy_diff_bps,
            cooldown_secs: policy.cooldown_secs,
            window_secs: policy.window_secs,
            max_per_window: policy.max_per_window,
            staleness_secs: policy.staleness_secs,
        };
        service.set_rebalance_policy(caller, policy).await?;
        changed = true;
    }
    Ok(Json(AckResponse::new("update_params", changed)))
}

/// Administration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/pause", post(pause))
        .route("/admin/unpause", post(unpause))
        .route("/admin/roles", post(grant_role))
        .route("/admin/roles/revoke", post(revoke_role))
        .route("/admin/params", put(update_params))
}
