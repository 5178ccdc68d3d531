//! HTTP surface: route handlers and request parsing

pub mod extract;
pub mod handlers;
pub mod upload;
