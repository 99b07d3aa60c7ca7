//! Vault handlers: overview, previews, share flows and the token edge.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Duration;

use super::caller;
use crate::api::dto::{
    AccountResponse, AckResponse, AmountRequest, DepositRequest, FaucetRequest, FlowResponse,
    MintRequest, PendingFeeDto, PreviewQuery, PreviewResponse, RedeemRequest,
    TransferSharesRequest, VaultOverview, WithdrawRequest, parse_address, parse_address_or,
    parse_amount,
};
use crate::app_state::AppState;
use crate::engine::Ledger;
use crate::error::{ErrorResponse, VaultError};

pub(crate) fn overview(ledger: &Ledger) -> Result<VaultOverview, VaultError> {
    let state = ledger.state();
    let timelock = Duration::seconds(state.params.fee_timelock_secs);
    Ok(VaultOverview {
        status: state.status.to_string(),
        total_assets: state.total_assets()?.to_string(),
        total_supply: state.shares.total_supply().to_string(),
        share_price: ledger.share_price()?.to_string(),
        idle_buffer: state.idle_buffer.to_string(),
        required_buffer: state.required_buffer()?.to_string(),
        withdrawable_buffer: state.withdrawable_buffer()?.to_string(),
        deployable_surplus: state.deployable_surplus()?.to_string(),
        total_deployed: state.total_deployed.to_string(),
        deposit_cap: state.params.deposit_cap.to_string(),
        buffer_bps: state.params.buffer_bps,
        buffer_management_enabled: state.params.buffer_management_enabled,
        management_fee_bps: state.fees.rate_bps,
        fees_collected: state.fees.total_collected.to_string(),
        pending_fee: state.fees.open_proposal().map(|p| PendingFeeDto {
            proposed_rate_bps: p.proposed_rate_bps,
            proposed_at: p.proposed_at,
            executable_at: p.proposed_at + timelock,
        }),
        domain_count: state.registry.len(),
        pending_recalls: state.pending_recalls.len(),
        last_rebalance_at: state.history.last_rebalance_at(),
    })
}

/// `GET /vault` — Vault-wide accounting snapshot.
///
/// # Errors
///
/// Returns [`VaultError::ArithmeticOverflow`] if a derived figure overflows.
#[utoipa::path(
    get,
    path = "/api/v1/vault",
    tag = "Vault",
    summary = "Vault overview",
    description = "Returns total assets, supply, share price, buffer figures, fee state and counts.",
    responses(
        (status = 200, description = "Vault overview", body = VaultOverview),
    )
)]
pub async fn get_vault(State(state): State<AppState>) -> Result<impl IntoResponse, VaultError> {
    let view = state.vault_service.read(overview).await?;
    Ok(Json(view))
}

/// `GET /vault/preview` — Price a deposit, mint, withdrawal or redemption.
///
/// # Errors
///
/// Returns [`VaultError`] on unparsable amounts or overflow.
#[utoipa::path(
    get,
    path = "/api/v1/vault/preview",
    tag = "Vault",
    summary = "Preview conversions",
    description = "With `assets`, returns shares minted by a deposit and burned by a withdrawal. With `shares`, returns assets paid for a mint and received by a redemption. Rounding always favours the vault.",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Conversion preview", body = PreviewResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, VaultError> {
    let assets = query
        .assets
        .as_deref()
        .map(|raw| parse_amount(raw, "assets"))
        .transpose()?;
    let shares = query
        .shares
        .as_deref()
        .map(|raw| parse_amount(raw, "shares"))
        .transpose()?;

    let response = state
        .vault_service
        .read(|ledger| -> Result<PreviewResponse, VaultError> {
            let mut response = PreviewResponse::default();
            if let Some(assets) = assets {
                response.deposit_shares = Some(ledger.preview_deposit(assets)?.to_string());
                response.withdraw_shares = Some(ledger.preview_withdraw(assets)?.to_string());
            }
            if let Some(shares) = shares {
                response.mint_assets = Some(ledger.preview_mint(shares)?.to_string());
                response.redeem_assets = Some(ledger.preview_redeem(shares)?.to_string());
            }
            Ok(response)
        })
        .await?;
    Ok(Json(response))
}

/// `POST /vault/deposit` — Deposit assets for shares.
///
/// # Errors
///
/// Returns [`VaultError`] if the deposit is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/vault/deposit",
    tag = "Vault",
    summary = "Deposit",
    description = "Pulls `assets` from the caller (who must have approved the vault) and mints shares to `receiver`.",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Shares minted", body = FlowResponse),
        (status = 409, description = "Vault paused", body = ErrorResponse),
        (status = 422, description = "Cap exceeded or rounds to zero", body = ErrorResponse),
    )
)]
pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DepositRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let assets = parse_amount(&req.assets, "assets")?;
    let receiver = parse_address_or(req.receiver.as_deref(), "receiver", caller)?;
    let shares = state.vault_service.deposit(caller, assets, receiver).await?;
    Ok(Json(FlowResponse {
        assets: assets.to_string(),
        shares: shares.to_string(),
    }))
}

/// `POST /vault/mint` — Mint an exact number of shares.
///
/// # Errors
///
/// Returns [`VaultError`] if the mint is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/vault/mint",
    tag = "Vault",
    summary = "Mint",
    request_body = MintRequest,
    responses(
        (status = 200, description = "Assets pulled", body = FlowResponse),
        (status = 422, description = "Cap exceeded", body = ErrorResponse),
    )
)]
pub async fn mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MintRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let shares = parse_amount(&req.shares, "shares")?;
    let receiver = parse_address_or(req.receiver.as_deref(), "receiver", caller)?;
    let assets = state.vault_service.mint(caller, shares, receiver).await?;
    Ok(Json(FlowResponse {
        assets: assets.to_string(),
        shares: shares.to_string(),
    }))
}

/// `POST /vault/withdraw` — Withdraw an exact amount of assets.
///
/// # Errors
///
/// Returns [`VaultError`] if the withdrawal is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/vault/withdraw",
    tag = "Vault",
    summary = "Withdraw",
    description = "Burns the owner's shares and pays `assets` from the idle buffer. The caller must be the owner.",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Shares burned", body = FlowResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 422, description = "Insufficient buffer or shares", body = ErrorResponse),
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let assets = parse_amount(&req.assets, "assets")?;
    let receiver = parse_address_or(req.receiver.as_deref(), "receiver", caller)?;
    let owner = parse_address_or(req.owner.as_deref(), "owner", caller)?;
    let shares = state
        .vault_service
        .withdraw(caller, assets, receiver, owner)
        .await?;
    Ok(Json(FlowResponse {
        assets: assets.to_string(),
        shares: shares.to_string(),
    }))
}

/// `POST /vault/redeem` — Redeem shares for assets.
///
/// # Errors
///
/// Returns [`VaultError`] if the redemption is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/vault/redeem",
    tag = "Vault",
    summary = "Redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Assets paid", body = FlowResponse),
        (status = 422, description = "Insufficient buffer or shares", body = ErrorResponse),
    )
)]
pub async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RedeemRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let shares = parse_amount(&req.shares, "shares")?;
    let receiver = parse_address_or(req.receiver.as_deref(), "receiver", caller)?;
    let owner = parse_address_or(req.owner.as_deref(), "owner", caller)?;
    let assets = state
        .vault_service
        .redeem(caller, shares, receiver, owner)
        .await?;
    Ok(Json(FlowResponse {
        assets: assets.to_string(),
        shares: shares.to_string(),
    }))
}

/// `POST /vault/transfer` — Move shares to another holder.
///
/// # Errors
///
/// Returns [`VaultError`] if the transfer is rejected.
#[utoipa::path(
    post,
    path = "/api/v1/vault/transfer",
    tag = "Vault",
    summary = "Transfer shares",
    request_body = TransferSharesRequest,
    responses(
        (status = 200, description = "Shares moved", body = AckResponse),
        (status = 422, description = "Insufficient shares", body = ErrorResponse),
    )
)]
pub async fn transfer_shares(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TransferSharesRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let to = parse_address(&req.to, "to")?;
    let shares = parse_amount(&req.shares, "shares")?;
    state.vault_service.transfer_shares(caller, to, shares).await?;
    Ok(Json(AckResponse::new("transfer_shares", true)))
}

/// `GET /accounts/{address}` — Shares, limits, token position and roles.
///
/// # Errors
///
/// Returns [`VaultError`] on a malformed address or overflow.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{address}",
    tag = "Vault",
    summary = "Account view",
    params(
        ("address" = String, Path, description = "0x-prefixed account address"),
    ),
    responses(
        (status = 200, description = "Account view", body = AccountResponse),
        (status = 400, description = "Malformed address", body = ErrorResponse),
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, VaultError> {
    let who = parse_address(&address, "address")?;
    let (token_balance, vault_allowance) = state.vault_service.token_position(who).await;
    let response = state
        .vault_service
        .read(|ledger| -> Result<AccountResponse, VaultError> {
            let shares = ledger.balance_of(who);
            Ok(AccountResponse {
                address: who.to_string(),
                shares: shares.to_string(),
                assets_value: ledger.convert_to_assets(shares)?.to_string(),
                max_withdraw: ledger.max_withdraw(who)?.to_string(),
                max_redeem: ledger.max_redeem(who)?.to_string(),
                token_balance: token_balance.to_string(),
                vault_allowance: vault_allowance.to_string(),
                roles: ledger
                    .state()
                    .access
                    .roles_of(who)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
        })
        .await?;
    Ok(Json(response))
}

/// `POST /token/approve` — Let the vault pull the caller's stablecoin.
///
/// # Errors
///
/// Returns [`VaultError`] on a malformed amount or token rejection.
#[utoipa::path(
    post,
    path = "/api/v1/token/approve",
    tag = "Token",
    summary = "Approve the vault",
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Allowance set", body = AckResponse),
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let caller = caller(&headers)?;
    let amount = parse_amount(&req.amount, "amount")?;
    state.vault_service.approve(caller, amount).await?;
    Ok(Json(AckResponse::new("approve", true)))
}

/// `POST /faucet` — Credit dev stablecoin (disabled by default).
///
/// # Errors
///
/// Returns [`VaultError`] if the faucet is disabled.
#[utoipa::path(
    post,
    path = "/api/v1/faucet",
    tag = "Token",
    summary = "Dev faucet",
    request_body = FaucetRequest,
    responses(
        (status = 201, description = "Account funded", body = AckResponse),
        (status = 400, description = "Faucet disabled", body = ErrorResponse),
    )
)]
pub async fn faucet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FaucetRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let to = match req.to.as_deref() {
        Some(raw) => parse_address(raw, "to")?,
        None => caller(&headers)?,
    };
    let amount = parse_amount(&req.amount, "amount")?;
    state.vault_service.fund(to, amount)?;
    Ok((StatusCode::CREATED, Json(AckResponse::new("faucet", true))))
}

/// Vault, account and token routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vault", get(get_vault))
        .route("/vault/preview", get(preview))
        .route("/vault/deposit", post(deposit))
        .route("/vault/mint", post(mint))
        .route("/vault/withdraw", post(withdraw))
        .route("/vault/redeem", post(redeem))
        .route("/vault/transfer", post(transfer_shares))
        .route("/accounts/{address}", get(get_account))
        .route("/token/approve", post(approve))
        .route("/faucet", post(faucet))
}
