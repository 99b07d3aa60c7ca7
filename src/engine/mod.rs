//! Engine layer: the vault ledger and its decision logic.
//!
//! Everything here is synchronous and deterministic given an explicit
//! `now`. The ledger calls out only through the traits in
//! [`crate::channel`]; the service layer owns locking, clocks and event
//! publication.

pub mod access;
pub mod fees;
pub mod health;
pub mod ledger;
pub mod rebalancer;
pub mod shares;
pub mod state;

pub use access::{AccessControl, Role};
pub use fees::{FeeState, PendingFeeUpdate, SECONDS_PER_YEAR};
pub use health::{Anomaly, Enforcement, HealthMonitor, HealthPolicy, HealthReport};
pub use ledger::{FeeCollection, InboundOutcome, Ledger, Ports, RebalanceOutcome};
pub use rebalancer::{
    RebalanceDecision, RebalanceHistory, RebalancePlan, RebalancePolicy, Reallocation, SkipReason,
};
pub use shares::{PRICE_SCALE, ShareLedger};
pub use state::{LedgerParams, LedgerState, LedgerStatus, PendingRecall};
