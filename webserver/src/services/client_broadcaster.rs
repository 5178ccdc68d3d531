//! Client broadcaster service implementation
//!
//! Pushes `ServerEvent`s to every connected browser. The stream is one-way;
//! text sent by clients is logged and otherwise ignored.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{WebServerError, WebServerResult};
use crate::state::WebServerState;
use crate::traits::ClientBroadcaster;
use crate::types::{AlertLevel, ClientId, ServerEvent};
use shared::{ProcessId, process_debug, process_info, process_warn};

/// Real client broadcaster service implementation
#[derive(Clone)]
pub struct RealClientBroadcaster {
    state: Arc<WebServerState>,
}

impl RealClientBroadcaster {
    pub fn new(state: Arc<WebServerState>) -> Self {
        Self { state }
    }

    fn encode(event: &ServerEvent) -> WebServerResult<Message> {
        Ok(Message::Text(serde_json::to_string(event)?))
    }
}

#[async_trait]
impl ClientBroadcaster for RealClientBroadcaster {
    async fn handle_connection(&self, socket: WebSocket, client_id: ClientId) -> WebServerResult<()> {
        let welcome = Self::encode(&ServerEvent::alert(
            AlertLevel::Info,
            "Connected to ColpoVision event stream",
        ))?;
        let count = self.state.increment_connection_count();
        process_info!(ProcessId::current(), "📱 WebSocket client {} connected ({} active)", client_id.0, count);

        let (mut sender, mut receiver) = socket.split();
        // Subscribe before greeting so no event published in between is lost
        let mut events = self.state.client_broadcast.subscribe();

        if let Err(e) = sender.send(welcome).await {
            self.state.decrement_connection_count();
            return Err(WebServerError::internal(format!("WebSocket greeting failed: {e}")));
        }

        let outgoing_id = client_id.clone();
        let mut outgoing_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let message = match Self::encode(&event) {
                            Ok(message) => message,
                            Err(e) => {
                                process_warn!(ProcessId::current(), "Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        process_warn!(
                            ProcessId::current(),
                            "⚠️ Client {} lagged, {} events dropped",
                            outgoing_id.0,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let incoming_id = client_id.clone();
        let mut incoming_task = tokio::spawn(async move {
            while let Some(message) = receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        process_debug!(ProcessId::current(), "📨 Ignoring message from client {}: {}", incoming_id.0, text);
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        process_debug!(ProcessId::current(), "WebSocket error for client {}: {}", incoming_id.0, e);
                        break;
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut outgoing_task => incoming_task.abort(),
            _ = &mut incoming_task => outgoing_task.abort(),
        }

        let remaining = self.state.decrement_connection_count();
        process_info!(ProcessId::current(), "🚪 Client {} disconnected ({} active)", client_id.0, remaining);
        Ok(())
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        // No subscribers is not an error
        self.state.client_broadcast.send(event).unwrap_or(0)
    }

    fn client_count(&self) -> u32 {
        self.state.get_connection_count()
    }
}
