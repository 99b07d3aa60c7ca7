//! WebSocket end-to-end: a real server on an ephemeral port, a tungstenite
//! client, and REST calls that produce the events it should receive.

#![allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use meridian_vault::api::build_router;
use meridian_vault::api::handlers::CALLER_HEADER;
use meridian_vault::app_state::AppState;
use meridian_vault::config::VaultConfig;
use meridian_vault::domain::Address;
use meridian_vault::engine::HealthMonitor;
use meridian_vault::service::bootstrap;
use meridian_vault::ws::handler::ws_handler;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ADMIN: Address = Address::repeat_byte(0xad);

async fn spawn_server() -> SocketAddr {
    let config = VaultConfig::default();
    let Ok(service) = bootstrap(&config, None).await else {
        panic!("bootstrap");
    };
    let monitor = HealthMonitor::new(config.keeper_address, config.health);
    let state = AppState::new(Arc::new(service), monitor);
    let app = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn command(client: &mut Client, id: &str, payload: Value) -> Value {
    let envelope = json!({
        "id": id,
        "type": "command",
        "timestamp": Utc::now(),
        "payload": payload,
    });
    client
        .send(Message::text(envelope.to_string()))
        .await
        .unwrap();
    next_json(client).await
}

async fn next_json(client: &mut Client) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

async fn register(addr: SocketAddr, domain_id: u32, vault: Address) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/domains"))
        .header(CALLER_HEADER, ADMIN.to_string())
        .json(&json!({ "domain_id": domain_id, "vault_address": vault.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn domain_subscriber_receives_only_its_domain() {
    let addr = spawn_server().await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let reply = command(
        &mut client,
        "sub-1",
        json!({ "command": "subscribe", "topics": ["10"] }),
    )
    .await;
    assert_eq!(reply["id"], "sub-1");
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["payload"]["subscribed"], json!(["10"]));

    register(addr, 20, Address::repeat_byte(0xd2)).await;
    register(addr, 10, Address::repeat_byte(0xd1)).await;

    let event = next_json(&mut client).await;
    assert_eq!(event["type"], "event");
    assert_eq!(event["payload"]["event_type"], "domain_registered");
    assert_eq!(event["payload"]["domain_id"], 10);
}

#[tokio::test]
async fn get_vault_answers_over_the_socket() {
    let addr = spawn_server().await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let reply = command(&mut client, "v-1", json!({ "command": "get_vault" })).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["payload"]["total_assets"], "1000000");

    let reply = command(&mut client, "d-1", json!({ "command": "get_domain", "domain_id": 99 })).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"]["code"], 404);
}

#[tokio::test]
async fn bad_topic_is_rejected_without_subscribing() {
    let addr = spawn_server().await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let reply = command(
        &mut client,
        "sub-2",
        json!({ "command": "subscribe", "topics": ["vault", "mars"] }),
    )
    .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"]["code"], 400);

    let reply = command(&mut client, "sub-3", json!({ "command": "subscribe", "topics": ["*"] })).await;
    assert_eq!(reply["payload"]["count"], 0);
    assert_eq!(reply["payload"]["wildcard"], true);
    assert_eq!(reply["payload"]["vault"], false);
}
