//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod domains;
pub mod messages;
pub mod rebalance;
pub mod system;
pub mod vault;

use axum::Router;
use axum::http::HeaderMap;

use crate::api::dto::parse_address;
use crate::app_state::AppState;
use crate::domain::Address;
use crate::error::{MalformedInput, VaultError};

/// Header naming the account a request acts as.
pub const CALLER_HEADER: &str = "x-caller-address";

/// Extracts the calling account from [`CALLER_HEADER`].
///
/// # Errors
///
/// Returns [`MalformedInput::InvalidRequest`] if the header is missing or
/// is not a valid address.
pub fn caller(headers: &HeaderMap) -> Result<Address, VaultError> {
    let raw = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MalformedInput::InvalidRequest(format!("missing {CALLER_HEADER} header")))?;
    parse_address(raw, CALLER_HEADER)
}

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(vault::routes())
        .merge(domains::routes())
        .merge(messages::routes())
        .merge(rebalance::routes())
        .merge(admin::routes())
}
