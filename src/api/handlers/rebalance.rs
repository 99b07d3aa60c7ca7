//! Rebalance and fee handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use super::caller;
use crate::api::dto::{
    AckResponse, FeeCollectionResponse, FeeProposalRequest, FeeProposalResponse, FeeRateResponse,
    ManualRebalanceRequest, RebalancePlanDto, RebalanceResponse, parse_amount,
};
use crate::app_state::AppState;
use crate::domain::DomainId;
use crate::error::{ErrorResponse, VaultError};

/// `GET /rebalance/preview` — What the rebalancer would do now.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] if the buffer surplus
/// overflows.
#[utoipa::path(
    get,
    path = "/api/v1/rebalance/preview",
    tag = "Rebalance",
    summary = "Preview a rebalance",
    description = "Evaluates the decision rule without moving capital.",
    responses(
        (status = 200, description = "Decision", body = RebalanceResponse),
    )
)]
pub async fn preview_rebalance(State(state): State<AppState>) -> Result<impl IntoResponse, VaultError> {
    let now = Utc::now();
    let decision = state
        .vault_service
        .read(|ledger| ledger.preview_rebalance(now))
        .await?;
    Ok(Json(RebalanceResponse::from(&decision)))
}

/// `POST /rebalance` — Run the rebalancer (Rebalancer).
///
/// # Errors
///
/// Returns [`VaultError`] if the caller lacks Rebalancer, the vault is
/// paused, or a channel refuses the plan.
#[utoipa::path(
    post,
    path = "/api/v1/rebalance",
    tag = "Rebalance",
    summary = "Rebalance",
    description = "Moves capital toward the best-yielding fresh domain when the APY edge strictly exceeds the threshold. A skip is a successful no-op.",
    responses(
        (status = 200, description = "Executed or skipped", body = RebalanceResponse),
        (status = 403, description = "Missing Rebalancer role", body = ErrorResponse),
        (status = 409, description = "Paused", body = ErrorResponse),
    )
)]
pub async fn rebalance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let outcome = state.vault_service.rebalance(caller).await?;
    Ok(Json(RebalanceResponse::from(&outcome)))
}

/// `POST /rebalance/manual` — Move capital between two domains (Rebalancer).
///
/// # Errors
///
/// Returns [`VaultError`] on cooldown, rate limit, unknown domains or an
/// amount above the source deployment.
#[utoipa::path(
    post,
    path = "/api/v1/rebalance/manual",
    tag = "Rebalance",
    summary = "Manual rebalance",
    request_body = ManualRebalanceRequest,
    responses(
        (status = 200, description = "Plan executed", body = RebalancePlanDto),
        (status = 409, description = "Cooldown or rate limit", body = ErrorResponse),
        (status = 422, description = "Exceeds deployment", body = ErrorResponse),
    )
)]
pub async fn manual_rebalance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ManualRebalanceRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let amount = parse_amount(&req.amount, "amount")?;
    let plan = state
        .vault_service
        .rebalance_between(caller, DomainId::new(req.from), DomainId::new(req.to), amount)
        .await?;
    Ok(Json(RebalancePlanDto::from(&plan)))
}

/// `POST /fees/collect` — Mint accrued management fees.
///
/// # Errors
///
/// Returns [`VaultError`] if the vault is paused or arithmetic overflows.
#[utoipa::path(
    post,
    path = "/api/v1/fees/collect",
    tag = "Fees",
    summary = "Collect fees",
    responses(
        (status = 200, description = "Fees collected (possibly zero)", body = FeeCollectionResponse),
        (status = 409, description = "Paused", body = ErrorResponse),
    )
)]
pub async fn collect_fees(State(state): State<AppState>) -> Result<impl IntoResponse, VaultError> {
    let collected = state.vault_service.collect_fees().await?;
    Ok(Json(FeeCollectionResponse {
        fee_assets: collected.fee_assets.to_string(),
        fee_shares: collected.fee_shares.to_string(),
    }))
}

/// `POST /fees/proposal` — Propose a new fee rate (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] if the rate exceeds the ceiling or the caller
/// lacks Admin.
#[utoipa::path(
    post,
    path = "/api/v1/fees/proposal",
    tag = "Fees",
    summary = "Propose a fee rate",
    description = "Starts the timelock. A new proposal replaces any open one.",
    request_body = FeeProposalRequest,
    responses(
        (status = 201, description = "Proposal recorded", body = FeeProposalResponse),
        (status = 422, description = "Above ceiling", body = ErrorResponse),
    )
)]
pub async fn propose_fee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FeeProposalRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let executable_at = state
        .vault_service
        .propose_fee_rate(caller, req.rate_bps)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FeeProposalResponse {
            rate_bps: req.rate_bps,
            executable_at,
        }),
    ))
}

/// `POST /fees/proposal/execute` — Apply the proposal after the timelock
/// (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] while the timelock runs or without a proposal.
#[utoipa::path(
    post,
    path = "/api/v1/fees/proposal/execute",
    tag = "Fees",
    summary = "Execute the fee proposal",
    description = "Collects fees accrued at the old rate, then switches rates.",
    responses(
        (status = 200, description = "Rate updated", body = FeeRateResponse),
        (status = 409, description = "Timelock active or no proposal", body = ErrorResponse),
    )
)]
pub async fn execute_fee(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let old_rate_bps = state.vault_service.execute_fee_rate(caller).await?;
    let new_rate_bps = state
        .vault_service
        .read(|ledger| ledger.state().fees.rate_bps)
        .await;
    Ok(Json(FeeRateResponse {
        old_rate_bps,
        new_rate_bps,
    }))
}

/// `DELETE /fees/proposal` — Cancel the open proposal (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] without an open proposal.
#[utoipa::path(
    delete,
    path = "/api/v1/fees/proposal",
    tag = "Fees",
    summary = "Cancel the fee proposal",
    responses(
        (status = 200, description = "Proposal cancelled", body = AckResponse),
        (status = 409, description = "No proposal", body = ErrorResponse),
    )
)]
pub async fn cancel_fee(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    state.vault_service.cancel_fee_rate(caller).await?;
    Ok(Json(AckResponse::new("cancel_fee_rate", true)))
}

/// Rebalance and fee routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rebalance", post(rebalance))
        .route("/rebalance/preview", get(preview_rebalance))
        .route("/rebalance/manual", post(manual_rebalance))
        .route("/fees/collect", post(collect_fees))
        .route("/fees/proposal", post(propose_fee).delete(cancel_fee))
        .route("/fees/proposal/execute", post(execute_fee))
}
