//! axum handlers. Each one resolves the caller, parses its typed request
//! and delegates to a service.

pub mod auth;
pub mod comments;
pub mod gifts;
pub mod health;
pub mod videos;
pub mod wallet;

use uuid::Uuid;

use crate::error::{AppError, Result};

/// A path id that is not a UUID cannot name anything that exists.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(what))
}
