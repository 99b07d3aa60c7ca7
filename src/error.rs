//! Vault error types with HTTP status code mapping.
//!
//! [`VaultError`] is the central error type. Engine failures fall into four
//! categories, each its own enum so callers can match on the reason:
//! [`PolicyViolation`], [`AuthorizationFailure`], [`StateViolation`] and
//! [`MalformedInput`]. Every variant maps to a numeric code, an HTTP status
//! and a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::channel::ChannelError;
use crate::domain::{Address, DomainId};
use crate::engine::Role;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4003,
///     "category": "policy_violation",
///     "message": "policy violation: deposit cap exceeded ...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Error category discriminator.
    pub category: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A configured safety policy would be violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Deposit would push total assets above the cap.
    #[error("deposit cap exceeded: total assets would be {attempted}, cap is {cap}")]
    DepositCapExceeded {
        /// Total assets after the rejected deposit.
        attempted: u128,
        /// Configured cap.
        cap: u128,
    },

    /// Idle buffer cannot serve the request without breaching the reserve.
    #[error("insufficient buffer: requested {requested}, available {available}")]
    InsufficientBuffer {
        /// Amount requested from the buffer.
        requested: u128,
        /// Amount the buffer policy allows.
        available: u128,
    },

    /// Owner holds fewer shares than requested.
    #[error("insufficient shares: requested {requested}, balance {balance}")]
    InsufficientShares {
        /// Shares requested.
        requested: u128,
        /// Shares held.
        balance: u128,
    },

    /// Proposed fee rate is above the ceiling.
    #[error("fee rate {rate_bps} bps exceeds ceiling {max_bps} bps")]
    FeeAboveCeiling {
        /// Proposed rate.
        rate_bps: u32,
        /// Configured ceiling.
        max_bps: u32,
    },

    /// Domain is already registered and active.
    #[error("domain {0} is already active")]
    DomainAlreadyActive(DomainId),

    /// Domain exists but has been retired.
    #[error("domain {0} is inactive")]
    DomainInactive(DomainId),

    /// More capital requested from a domain than is recorded there.
    #[error("domain {domain_id} holds {deployed}, requested {requested}")]
    ExceedsDeployment {
        /// Domain asked to give up capital.
        domain_id: DomainId,
        /// Amount requested.
        requested: u128,
        /// Amount recorded as deployed.
        deployed: u128,
    },

    /// Seed shares are locked forever.
    #[error("seed shares are not transferable")]
    SeedLocked,

    /// Domain cannot be retired while capital sits there or is on its way back.
    #[error("domain {domain_id} still holds {deployed} with {pending_recalls} recall(s) in flight")]
    DomainHoldsCapital {
        /// Domain asked to retire.
        domain_id: DomainId,
        /// Amount recorded as deployed.
        deployed: u128,
        /// Unsettled recalls from the domain.
        pending_recalls: usize,
    },

    /// Configuration value outside its allowed range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// The caller lacks a capability, or an inbound message is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationFailure {
    /// Caller does not hold the role required by the operation.
    #[error("{caller} lacks role {role}")]
    MissingRole {
        /// Caller address.
        caller: Address,
        /// Required role.
        role: Role,
    },

    /// Caller is neither the owner of the shares nor approved.
    #[error("{caller} may not act for {owner}")]
    NotOwner {
        /// Caller address.
        caller: Address,
        /// Share owner.
        owner: Address,
    },

    /// Inbound message from an unknown or inactive domain.
    #[error("message from unrecognized domain {0}")]
    UnknownDomain(DomainId),

    /// Inbound message sender does not match the registered vault address.
    #[error("sender {sender} is not the vault of domain {domain_id}")]
    UnverifiedSender {
        /// Origin domain.
        domain_id: DomainId,
        /// Claimed sender.
        sender: Address,
    },
}

/// Operation attempted in a lifecycle state that forbids it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    /// Vault is paused.
    #[error("vault is paused")]
    Paused,

    /// Unpause attempted while not paused.
    #[error("vault is not paused")]
    NotPaused,

    /// Genesis already performed.
    #[error("vault already initialized")]
    AlreadyInitialized,

    /// Operation before genesis.
    #[error("vault not initialized")]
    NotInitialized,

    /// Rebalance attempted inside the cooldown.
    #[error("rebalance cooldown active for another {remaining_secs}s")]
    CooldownActive {
        /// Seconds until the cooldown ends.
        remaining_secs: i64,
    },

    /// Rebalance budget for the rolling window is exhausted.
    #[error("rebalance rate limit reached: {executed} in window (max {max})")]
    RateLimited {
        /// Rebalances already in the window.
        executed: usize,
        /// Window maximum.
        max: usize,
    },

    /// No fee change is pending.
    #[error("no pending fee update")]
    NoPendingFeeUpdate,

    /// Fee change still inside its time lock.
    #[error("fee update timelocked for another {remaining_secs}s")]
    FeeTimelockActive {
        /// Seconds until executable.
        remaining_secs: i64,
    },

    /// Shares are outstanding but back no assets; nothing can be priced.
    #[error("outstanding shares are backed by zero assets")]
    SharesWorthless,
}

/// Input that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedInput {
    /// Amount is zero where a positive value is required.
    #[error("{0} must be greater than zero")]
    ZeroAmount(&'static str),

    /// Zero address where a real account is required.
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    /// The conversion rounds to nothing.
    #[error("operation rounds to zero {0}")]
    RoundsToZero(&'static str),

    /// Payload could not be decoded.
    #[error("undecodable payload: {0}")]
    UndecodablePayload(String),

    /// Message kind not accepted on the inbound path.
    #[error("unexpected inbound message kind {0}")]
    UnexpectedMessage(&'static str),

    /// Payload names a different domain than the delivery origin.
    #[error("payload domain {payload} does not match origin {origin}")]
    DomainMismatch {
        /// Origin reported by the channel.
        origin: DomainId,
        /// Domain named in the payload.
        payload: DomainId,
    },

    /// Report carries an implausible value.
    #[error("implausible report: {0}")]
    ImplausibleReport(String),

    /// Source and destination are the same domain.
    #[error("source and destination domain are both {0}")]
    SameDomain(DomainId),

    /// Free-form request validation failure.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                 |
/// |-----------|-----------------------|-----------------------------|
/// | 1000–1999 | Malformed input       | 400 Bad Request             |
/// | 2000–2999 | Authorization         | 403 Forbidden               |
/// | 3000–3999 | State / not found     | 409 Conflict / 404          |
/// | 4000–4999 | Policy                | 422 Unprocessable Entity    |
/// | 5000–5999 | Channel / server      | 502 Bad Gateway / 500       |
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// A safety policy would be violated.
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// Missing capability or untrusted sender.
    #[error("authorization failure: {0}")]
    Unauthorized(#[from] AuthorizationFailure),

    /// Forbidden in the current lifecycle state.
    #[error("state violation: {0}")]
    State(#[from] StateViolation),

    /// Undecodable or invalid input.
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    /// Transfer or message channel refused the call. Never retried
    /// automatically.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Domain was never registered.
    #[error("domain not found: {0}")]
    DomainNotFound(DomainId),

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Returns the error category as a static string.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Policy(_) => "policy_violation",
            Self::Unauthorized(_) => "authorization_failure",
            Self::State(_) | Self::DomainNotFound(_) => "state_violation",
            Self::Malformed(_) => "malformed_input",
            Self::Channel(_) => "channel_failure",
            Self::ArithmeticOverflow | Self::Persistence(_) | Self::Internal(_) => "internal",
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Malformed(m) => match m {
                MalformedInput::ZeroAmount(_) => 1001,
                MalformedInput::ZeroAddress(_) => 1002,
                MalformedInput::RoundsToZero(_) => 1003,
                MalformedInput::UndecodablePayload(_) => 1004,
                MalformedInput::UnexpectedMessage(_) => 1005,
                MalformedInput::DomainMismatch { .. } => 1006,
                MalformedInput::ImplausibleReport(_) => 1007,
                MalformedInput::SameDomain(_) => 1008,
                MalformedInput::InvalidRequest(_) => 1009,
            },
            Self::Unauthorized(a) => match a {
                AuthorizationFailure::MissingRole { .. } => 2001,
                AuthorizationFailure::NotOwner { .. } => 2002,
                AuthorizationFailure::UnknownDomain(_) => 2003,
                AuthorizationFailure::UnverifiedSender { .. } => 2004,
            },
            Self::State(s) => match s {
                StateViolation::Paused => 3001,
                StateViolation::NotPaused => 3002,
                StateViolation::AlreadyInitialized => 3003,
                StateViolation::NotInitialized => 3004,
                StateViolation::CooldownActive { .. } => 3005,
                StateViolation::RateLimited { .. } => 3006,
                StateViolation::NoPendingFeeUpdate => 3007,
                StateViolation::FeeTimelockActive { .. } => 3008,
                StateViolation::SharesWorthless => 3009,
            },
            Self::DomainNotFound(_) => 3404,
            Self::Policy(p) => match p {
                PolicyViolation::DepositCapExceeded { .. } => 4001,
                PolicyViolation::InsufficientBuffer { .. } => 4002,
                PolicyViolation::InsufficientShares { .. } => 4003,
                PolicyViolation::FeeAboveCeiling { .. } => 4004,
                PolicyViolation::DomainAlreadyActive(_) => 4005,
                PolicyViolation::DomainInactive(_) => 4006,
                PolicyViolation::SeedLocked => 4007,
                PolicyViolation::InvalidParameter { .. } => 4008,
                PolicyViolation::ExceedsDeployment { .. } => 4009,
                PolicyViolation::DomainHoldsCapital { .. } => 4010,
            },
            Self::Channel(_) => 5002,
            Self::ArithmeticOverflow => 5001,
            Self::Persistence(_) => 5003,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::State(_) => StatusCode::CONFLICT,
            Self::DomainNotFound(_) => StatusCode::NOT_FOUND,
            Self::Policy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Channel(_) => StatusCode::BAD_GATEWAY,
            Self::ArithmeticOverflow | Self::Persistence(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                category: self.category().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
