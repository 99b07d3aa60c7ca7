//! Shared DTO types and parsing helpers used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Address;
use crate::error::{MalformedInput, VaultError};

/// Body carrying a single amount.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AmountRequest {
    /// Amount in stablecoin base units (string-encoded u128).
    pub amount: String,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AckResponse {
    /// Operation that completed.
    pub operation: String,
    /// `false` when the call was a no-op (e.g. role already held).
    pub changed: bool,
}

impl AckResponse {
    /// Acknowledges `operation`.
    #[must_use]
    pub fn new(operation: &str, changed: bool) -> Self {
        Self {
            operation: operation.to_string(),
            changed,
        }
    }
}

/// Parses a string-encoded u128.
///
/// # Errors
///
/// Returns [`MalformedInput::InvalidRequest`] naming `field` if `raw` is not
/// an unsigned decimal integer.
pub fn parse_amount(raw: &str, field: &str) -> Result<u128, VaultError> {
    raw.trim().parse::<u128>().map_err(|_| {
        MalformedInput::InvalidRequest(format!("{field} must be an unsigned integer, got {raw:?}"))
            .into()
    })
}

/// Parses a hex address.
///
/// # Errors
///
/// Returns [`MalformedInput::InvalidRequest`] naming `field` on malformed
/// input.
pub fn parse_address(raw: &str, field: &str) -> Result<Address, VaultError> {
    raw.parse::<Address>()
        .map_err(|e| MalformedInput::InvalidRequest(format!("{field}: {e}")).into())
}

/// Parses an optional address, defaulting to `fallback`.
///
/// # Errors
///
/// See [`parse_address`].
pub fn parse_address_or(
    raw: Option<&str>,
    field: &str,
    fallback: Address,
) -> Result<Address, VaultError> {
    raw.map_or(Ok(fallback), |r| parse_address(r, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_parse_full_u128_range() {
        assert_eq!(parse_amount(&u128::MAX.to_string(), "a").ok(), Some(u128::MAX));
        assert_eq!(parse_amount(" 42 ", "a").ok(), Some(42));
        assert!(parse_amount("-1", "a").is_err());
        assert!(parse_amount("1e6", "a").is_err());
    }

    #[test]
    fn optional_address_falls_back() {
        let fallback = Address::repeat_byte(7);
        assert_eq!(parse_address_or(None, "receiver", fallback).ok(), Some(fallback));
        assert!(parse_address_or(Some("0x12"), "receiver", fallback).is_err());
    }
}
