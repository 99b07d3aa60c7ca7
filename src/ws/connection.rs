//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, Topic};
use crate::api::dto::DomainDto;
use crate::api::handlers::vault::overview;
use crate::domain::{DomainId, VaultEvent};
use crate::service::VaultService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<VaultEvent>,
    vault_service: Arc<VaultService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &vault_service).await;
                        if let Ok(json) = serde_json::to_string(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(vault_event) => {
                        if subs.matches(&vault_event) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&vault_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn parse_topics(raw: &[String]) -> Result<Vec<Topic>, String> {
    raw.iter().map(|t| t.parse::<Topic>()).collect()
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    vault_service: &VaultService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { topics } => match parse_topics(&topics) {
            Ok(topics) => {
                subs.subscribe(&topics);
                WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::json!({
                        "subscribed": topics.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        "count": subs.count(),
                        "vault": subs.is_subscribed_vault(),
                        "wildcard": subs.is_subscribed_all(),
                    }),
                )
            }
            Err(e) => WsMessage::error(msg.id, 400, &e),
        },
        WsCommand::Unsubscribe { topics } => match parse_topics(&topics) {
            Ok(topics) => {
                subs.unsubscribe(&topics);
                WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::json!({
                        "unsubscribed": topics.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        "remaining_count": subs.count(),
                    }),
                )
            }
            Err(e) => WsMessage::error(msg.id, 400, &e),
        },
        WsCommand::GetVault => match vault_service.read(overview).await {
            Ok(view) => WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::to_value(&view).unwrap_or_default(),
            ),
            Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
        },
        WsCommand::GetDomain { domain_id } => {
            let now = Utc::now();
            let view = vault_service
                .read(|ledger| {
                    let staleness = ledger.params().rebalance.staleness();
                    ledger
                        .domain(DomainId::new(domain_id))
                        .map(|r| DomainDto::from_record(r, now, staleness))
                })
                .await;
            match view {
                Ok(dto) => WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(&dto).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn topics_parse_all_or_nothing() {
        let ok = parse_topics(&["*".to_string(), "10".to_string()]);
        assert_eq!(ok.ok().map(|t| t.len()), Some(2));
        assert!(parse_topics(&["10".to_string(), "nope".to_string()]).is_err());
    }
}
