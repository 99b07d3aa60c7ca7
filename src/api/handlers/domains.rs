//! Domain handlers: registry, capital movement and manual reports.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use super::caller;
use crate::api::dto::{
    AmountRequest, DeployResponse, DomainDto, DomainListResponse, InboundResponse,
    PendingRecallDto, RecallResponse, RegisterDomainRequest, ReportYieldRequest, parse_address,
    parse_amount,
};
use crate::app_state::AppState;
use crate::domain::DomainId;
use crate::error::{ErrorResponse, VaultError};

/// `GET /domains` — List every registered domain.
#[utoipa::path(
    get,
    path = "/api/v1/domains",
    tag = "Domains",
    summary = "List domains",
    description = "Returns every registered domain, active or retired, ordered by id.",
    responses(
        (status = 200, description = "Domain list", body = DomainListResponse),
    )
)]
pub async fn list_domains(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let data = state
        .vault_service
        .read(|ledger| {
            let staleness = ledger.params().rebalance.staleness();
            ledger
                .state()
                .registry
                .all()
                .map(|r| DomainDto::from_record(r, now, staleness))
                .collect::<Vec<_>>()
        })
        .await;
    Json(DomainListResponse { data })
}

/// `POST /domains` — Register or reactivate a child vault (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] if the caller lacks Admin or the domain is
/// already active.
#[utoipa::path(
    post,
    path = "/api/v1/domains",
    tag = "Domains",
    summary = "Register a domain",
    request_body = RegisterDomainRequest,
    responses(
        (status = 201, description = "Domain registered", body = DomainDto),
        (status = 403, description = "Missing Admin role", body = ErrorResponse),
        (status = 422, description = "Domain already active", body = ErrorResponse),
    )
)]
pub async fn register_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterDomainRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let domain_id = DomainId::new(req.domain_id);
    let vault_address = parse_address(&req.vault_address, "vault_address")?;
    state
        .vault_service
        .add_domain(caller, domain_id, vault_address)
        .await?;
    let dto = domain_view(&state, domain_id).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

async fn domain_view(state: &AppState, domain_id: DomainId) -> Result<DomainDto, VaultError> {
    let now = Utc::now();
    state
        .vault_service
        .read(|ledger| {
            let staleness = ledger.params().rebalance.staleness();
            ledger
                .domain(domain_id)
                .map(|r| DomainDto::from_record(r, now, staleness))
        })
        .await
}

/// `GET /domains/{id}` — Domain details.
///
/// # Errors
///
/// Returns [`VaultError::DomainNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/domains/{id}",
    tag = "Domains",
    summary = "Get a domain",
    params(
        ("id" = u32, Path, description = "Domain identifier"),
    ),
    responses(
        (status = 200, description = "Domain details", body = DomainDto),
        (status = 404, description = "Domain not found", body = ErrorResponse),
    )
)]
pub async fn get_domain(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, VaultError> {
    Ok(Json(domain_view(&state, DomainId::new(id)).await?))
}

/// `DELETE /domains/{id}` — Retire a child vault (Admin).
///
/// # Errors
///
/// Returns [`VaultError`] if the caller lacks Admin, the domain is not
/// active, or it still holds capital.
#[utoipa::path(
    delete,
    path = "/api/v1/domains/{id}",
    tag = "Domains",
    summary = "Retire a domain",
    description = "Marks an empty domain inactive and keeps its record. Refused while capital is deployed there or a recall is unsettled.",
    params(
        ("id" = u32, Path, description = "Domain identifier"),
    ),
    responses(
        (status = 204, description = "Domain retired"),
        (status = 404, description = "Domain not found", body = ErrorResponse),
        (status = 422, description = "Domain inactive or still holds capital", body = ErrorResponse),
    )
)]
pub async fn retire_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    state
        .vault_service
        .retire_domain(caller, DomainId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /domains/{id}/deploy` — Send idle capital to a domain (Manager).
///
/// # Errors
///
/// Returns [`VaultError`] if the buffer cannot cover the amount or the
/// bridge refuses it.
#[utoipa::path(
    post,
    path = "/api/v1/domains/{id}/deploy",
    tag = "Domains",
    summary = "Deploy capital",
    params(
        ("id" = u32, Path, description = "Domain identifier"),
    ),
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Capital dispatched", body = DeployResponse),
        (status = 422, description = "Would breach the buffer reserve", body = ErrorResponse),
        (status = 502, description = "Bridge failure", body = ErrorResponse),
    )
)]
pub async fn deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let amount = parse_amount(&req.amount, "amount")?;
    let transfer_id = state
        .vault_service
        .deploy(caller, DomainId::new(id), amount)
        .await?;
    Ok(Json(DeployResponse {
        transfer_id: *transfer_id.as_uuid(),
        domain_id: id,
        amount: amount.to_string(),
    }))
}

/// `POST /domains/{id}/recall` — Ask a domain to return capital (Manager).
///
/// # Errors
///
/// Returns [`VaultError`] if the amount exceeds recallable capital or the
/// messenger refuses the request.
#[utoipa::path(
    post,
    path = "/api/v1/domains/{id}/recall",
    tag = "Domains",
    summary = "Recall capital",
    params(
        ("id" = u32, Path, description = "Domain identifier"),
    ),
    request_body = AmountRequest,
    responses(
        (status = 202, description = "Recall requested", body = RecallResponse),
        (status = 422, description = "Exceeds deployment", body = ErrorResponse),
    )
)]
pub async fn recall(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let amount = parse_amount(&req.amount, "amount")?;
    let recall_id = state
        .vault_service
        .recall(caller, DomainId::new(id), amount)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RecallResponse {
            recall_id,
            domain_id: id,
            amount: amount.to_string(),
        }),
    ))
}

/// `POST /domains/{id}/report` — Manual yield report (Manager).
///
/// # Errors
///
/// Returns [`VaultError`] if the report is implausible or the caller lacks
/// Manager.
#[utoipa::path(
    post,
    path = "/api/v1/domains/{id}/report",
    tag = "Domains",
    summary = "Report yield",
    description = "Overwrites the domain's APY and deployed amount, stamped with the server time. Accepted while paused.",
    params(
        ("id" = u32, Path, description = "Domain identifier"),
    ),
    request_body = ReportYieldRequest,
    responses(
        (status = 200, description = "Report applied", body = InboundResponse),
        (status = 400, description = "Implausible report", body = ErrorResponse),
    )
)]
pub async fn report_yield(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(req): Json<ReportYieldRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let deployed = parse_amount(&req.deployed_amount, "deployed_amount")?;
    let outcome = state
        .vault_service
        .report_yield(caller, DomainId::new(id), req.apy_bps, deployed)
        .await?;
    Ok(Json(InboundResponse {
        outcome: outcome.kind().to_string(),
        domain_id: outcome.domain_id().get(),
    }))
}

/// `GET /recalls` — Recalls awaiting settlement.
#[utoipa::path(
    get,
    path = "/api/v1/recalls",
    tag = "Domains",
    summary = "Pending recalls",
    responses(
        (status = 200, description = "Pending recalls ordered by id", body = Vec<PendingRecallDto>),
    )
)]
pub async fn pending_recalls(State(state): State<AppState>) -> impl IntoResponse {
    let recalls = state
        .vault_service
        .read(|ledger| {
            ledger
                .pending_recalls()
                .map(PendingRecallDto::from)
                .collect::<Vec<_>>()
        })
        .await;
    Json(recalls)
}

/// Domain and capital routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/domains", get(list_domains).post(register_domain))
        .route("/domains/{id}", get(get_domain).delete(retire_domain))
        .route("/domains/{id}/deploy", post(deploy))
        .route("/domains/{id}/recall", post(recall))
        .route("/domains/{id}/report", post(report_yield))
        .route("/recalls", get(pending_recalls))
}
