//! Capability checks for privileged operations.
//!
//! Roles are a flat tagged enum; an address holds any subset of them. Every
//! privileged ledger entry point starts with [`AccessControl::require`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Address;
use crate::error::{AuthorizationFailure, MalformedInput, VaultError};

/// A privileged capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Fee, cap and domain-registration changes; role administration;
    /// unpausing.
    Admin,
    /// Deploy and recall capital; manual yield reports.
    Manager,
    /// Trigger rebalances.
    Rebalancer,
    /// Emergency pause.
    Pauser,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Rebalancer, Role::Pauser];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Manager => write!(f, "manager"),
            Self::Rebalancer => write!(f, "rebalancer"),
            Self::Pauser => write!(f, "pauser"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "rebalancer" => Ok(Self::Rebalancer),
            "pauser" => Ok(Self::Pauser),
            other => Err(MalformedInput::InvalidRequest(format!("unknown role: {other}")).into()),
        }
    }
}

/// Role assignments keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    grants: HashMap<Address, BTreeSet<Role>>,
}

impl AccessControl {
    /// Creates an empty assignment table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `who` holds `role`.
    #[must_use]
    pub fn has_role(&self, who: Address, role: Role) -> bool {
        self.grants.get(&who).is_some_and(|roles| roles.contains(&role))
    }

    /// Fails unless `caller` holds `role`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationFailure::MissingRole`].
    pub fn require(&self, caller: Address, role: Role) -> Result<(), VaultError> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            Err(AuthorizationFailure::MissingRole { caller, role }.into())
        }
    }

    /// Fails unless `caller` holds at least one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationFailure::MissingRole`] naming the first role.
    pub fn require_any(&self, caller: Address, roles: &[Role]) -> Result<(), VaultError> {
        if roles.iter().any(|r| self.has_role(caller, *r)) {
            return Ok(());
        }
        let role = roles.first().copied().unwrap_or(Role::Admin);
        Err(AuthorizationFailure::MissingRole { caller, role }.into())
    }

    /// Roles held by `who`.
    #[must_use]
    pub fn roles_of(&self, who: Address) -> Vec<Role> {
        self.grants
            .get(&who)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Grants `role` to `who`. Returns `false` if already held.
    pub(crate) fn grant(&mut self, who: Address, role: Role) -> bool {
        self.grants.entry(who).or_default().insert(role)
    }

    /// Revokes `role` from `who`. Returns `false` if not held.
    pub(crate) fn revoke(&mut self, who: Address, role: Role) -> bool {
        let Some(roles) = self.grants.get_mut(&who) else {
            return false;
        };
        let removed = roles.remove(&role);
        if roles.is_empty() {
            self.grants.remove(&who);
        }
        removed
    }

    /// Number of addresses holding `role`.
    #[must_use]
    pub fn holders(&self, role: Role) -> usize {
        self.grants.values().filter(|r| r.contains(&role)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_grant() {
        let mut acl = AccessControl::new();
        let alice = Address::repeat_byte(1);
        assert!(acl.require(alice, Role::Manager).is_err());
        assert!(acl.grant(alice, Role::Manager));
        assert!(acl.require(alice, Role::Manager).is_ok());
        assert!(acl.require(alice, Role::Admin).is_err());
    }

    #[test]
    fn require_any_accepts_either_role() {
        let mut acl = AccessControl::new();
        let bob = Address::repeat_byte(2);
        acl.grant(bob, Role::Pauser);
        assert!(acl.require_any(bob, &[Role::Admin, Role::Pauser]).is_ok());
        assert!(acl.require_any(bob, &[Role::Admin, Role::Manager]).is_err());
    }

    #[test]
    fn revoke_removes_empty_entries() {
        let mut acl = AccessControl::new();
        let carol = Address::repeat_byte(3);
        acl.grant(carol, Role::Rebalancer);
        assert!(acl.revoke(carol, Role::Rebalancer));
        assert!(!acl.revoke(carol, Role::Rebalancer));
        assert!(acl.roles_of(carol).is_empty());
        assert_eq!(acl.holders(Role::Rebalancer), 0);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert!(matches!("Pauser".parse::<Role>(), Ok(Role::Pauser)));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_through_json_with_address_keys() {
        let mut acl = AccessControl::new();
        acl.grant(Address::repeat_byte(9), Role::Admin);
        let json = serde_json::to_string(&acl).unwrap_or_default();
        let restored: Option<AccessControl> = serde_json::from_str(&json).ok();
        assert_eq!(restored, Some(acl));
    }
}
