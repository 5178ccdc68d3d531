//! WebSocket connection handler
//!
//! Browser clients subscribe here for progress and completion events

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::types::ClientId;
use crate::webserver_impl::WebServer;
use shared::{ProcessId, logging};

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(server): State<WebServer>) -> Response {
    let broadcaster = server.services.broadcaster.clone();
    ws.on_upgrade(move |socket| async move {
        let client_id = ClientId::new();
        if let Err(e) = broadcaster.handle_connection(socket, client_id.clone()).await {
            logging::log_error(ProcessId::current(), &format!("WebSocket client {}", client_id.0), &e);
        }
    })
}
