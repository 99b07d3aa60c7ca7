//! Data Transfer Objects for REST request/response serialization.
//!
//! All numeric amounts are serialized as JSON strings to prevent
//! precision loss on u128 values.

pub mod admin_dto;
pub mod common_dto;
pub mod domain_dto;
pub mod vault_dto;

pub use admin_dto::*;
pub use common_dto::*;
pub use domain_dto::*;
pub use vault_dto::*;
