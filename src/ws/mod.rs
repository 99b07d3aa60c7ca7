//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams committed vault events filtered
//! by domain and answers read-only queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
