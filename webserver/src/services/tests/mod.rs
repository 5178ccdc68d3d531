//! Service tests for webserver
//!
//! Exercises the real services against a fresh `WebServerState`.

pub mod helpers;
pub mod analysis_store;
