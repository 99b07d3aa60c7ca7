//! Cross-domain message handlers: the inbound relay endpoint and read-only
//! views of what the vault dispatched.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    InboundMessageRequest, InboundResponse, OutboundMessageDto, TransferDto, parse_address,
};
use crate::app_state::AppState;
use crate::channel::{CrossDomainMessage, InboundMessage};
use crate::domain::DomainId;
use crate::error::{ErrorResponse, MalformedInput, VaultError};

/// `POST /messages/inbound` — Deliver a message from a remote domain.
///
/// # Errors
///
/// Returns [`VaultError`] if the payload is undecodable, the sender is not
/// the registered child vault, or the message cannot be applied.
#[utoipa::path(
    post,
    path = "/api/v1/messages/inbound",
    tag = "Messages",
    summary = "Deliver an inbound message",
    description = "Entry point for the messaging infrastructure. The payload is verified against the domain registry before anything is applied; rejections leave the ledger untouched and are broadcast as `message_rejected` events.",
    request_body = InboundMessageRequest,
    responses(
        (status = 200, description = "Message applied", body = InboundResponse),
        (status = 400, description = "Undecodable or inconsistent payload", body = ErrorResponse),
        (status = 403, description = "Unknown domain or unverified sender", body = ErrorResponse),
    )
)]
pub async fn deliver_inbound(
    State(state): State<AppState>,
    Json(req): Json<InboundMessageRequest>,
) -> Result<impl IntoResponse, VaultError> {
    let sender = parse_address(&req.sender, "sender")?;
    let raw = req.payload.trim();
    let payload = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| MalformedInput::UndecodablePayload(format!("payload is not hex: {e}")))?;
    let outcome = state
        .vault_service
        .handle_inbound(InboundMessage {
            origin: DomainId::new(req.origin),
            sender,
            payload,
        })
        .await?;
    Ok(Json(InboundResponse {
        outcome: outcome.kind().to_string(),
        domain_id: outcome.domain_id().get(),
    }))
}

/// `GET /messages/outbound` — Messages dispatched by the vault.
#[utoipa::path(
    get,
    path = "/api/v1/messages/outbound",
    tag = "Messages",
    summary = "Outbound message log",
    description = "Lists every message sent through the in-process messenger, oldest first.",
    responses(
        (status = 200, description = "Outbound messages", body = Vec<OutboundMessageDto>),
    )
)]
pub async fn outbound_messages(State(state): State<AppState>) -> impl IntoResponse {
    let messages: Vec<OutboundMessageDto> = state
        .vault_service
        .outbound_messages()
        .into_iter()
        .map(|m| OutboundMessageDto {
            message_id: m.message_id.to_string(),
            destination: m.destination.get(),
            kind: CrossDomainMessage::decode(&m.payload)
                .map_or_else(|_| "undecodable".to_string(), |d| d.kind().to_string()),
            payload: format!("0x{}", hex::encode(&m.payload)),
            fee: m.fee.to_string(),
            sent_at: m.sent_at,
        })
        .collect();
    Json(messages)
}

/// `GET /transfers` — Bridge transfers dispatched by the vault.
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    tag = "Messages",
    summary = "Transfer log",
    responses(
        (status = 200, description = "Dispatched transfers", body = Vec<TransferDto>),
    )
)]
pub async fn transfers(State(state): State<AppState>) -> impl IntoResponse {
    let transfers: Vec<TransferDto> = state
        .vault_service
        .transfers()
        .into_iter()
        .map(|t| TransferDto {
            transfer_id: *t.transfer_id.as_uuid(),
            destination: t.destination.get(),
            recipient: t.recipient.to_string(),
            amount: t.amount.to_string(),
            hops: t.hops.iter().map(|h| h.get()).collect(),
            dispatched_at: t.dispatched_at,
        })
        .collect();
    Json(transfers)
}

/// Message and transfer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages/inbound", post(deliver_inbound))
        .route("/messages/outbound", get(outbound_messages))
        .route("/transfers", get(transfers))
}
