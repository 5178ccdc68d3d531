//! Route handlers grouped by area

pub mod analyze;
pub mod api;
pub mod patients;
pub mod reports;
pub mod static_files;
pub mod websocket;

use uuid::Uuid;

use crate::error::{WebServerError, WebServerResult};

/// Parse an id path segment, reporting bad input as 400
pub(crate) fn parse_uuid(raw: &str) -> WebServerResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| WebServerError::invalid(format!("Invalid id: {raw}")))
}
