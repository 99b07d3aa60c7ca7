//! Type-safe remote domain identifier.
//!
//! [`DomainId`] is a newtype around the numeric identifier the messaging
//! layer uses to address a remote execution environment. The concrete
//! numbering (chain ids, messenger-specific ids) is configuration data; the
//! vault only requires that it is stable for the lifetime of a record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a remote yield domain.
///
/// Used as the key of [`super::DomainRegistry`], as the destination of
/// transfer and message channel calls, and as the WebSocket subscription
/// target for domain-scoped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(u32);

impl DomainId {
    /// Creates a `DomainId` from its raw numeric value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u32> for DomainId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<DomainId> for u32 {
    fn from(id: DomainId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_numeric() {
        assert_eq!(DomainId::new(42161).to_string(), "42161");
    }

    #[test]
    fn parses_with_whitespace() {
        let Ok(id) = " 8453 ".parse::<DomainId>() else {
            panic!("valid domain id");
        };
        assert_eq!(id, DomainId::new(8453));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!("base".parse::<DomainId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&DomainId::new(10)).unwrap_or_default();
        assert_eq!(json, "10");
    }

    #[test]
    fn orders_numerically() {
        assert!(DomainId::new(2) < DomainId::new(10));
    }
}
