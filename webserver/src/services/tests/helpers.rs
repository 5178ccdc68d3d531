//! Test helpers for webserver service tests

use crate::config::RuntimeSettings;
use crate::state::WebServerState;
use std::net::SocketAddr;
use std::sync::Arc;

/// Create a test webserver state for testing
pub fn create_test_state() -> Arc<WebServerState> {
    create_test_state_with_settings(RuntimeSettings::default())
}

/// Create a test webserver state with custom runtime settings
pub fn create_test_state_with_settings(settings: RuntimeSettings) -> Arc<WebServerState> {
    let bind_addr: SocketAddr = "127.0.0.1:8501".parse().unwrap();
    Arc::new(WebServerState::new(bind_addr, settings))
}
