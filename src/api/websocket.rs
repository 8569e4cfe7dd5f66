use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::error::ServerError;
use crate::session::protocol::{ClientEvent, ServerEvent};
use crate::session::{SessionGateway, SessionHandler};

pub async fn handle_websocket(websocket: WebSocket, gateway: Arc<SessionGateway>) {
    tracing::info!("New WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut handler = gateway.handler(tx);

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_message(&mut handler, message).await,
            Err(e) => {
                tracing::error!(error = %e, conn_id = %handler.conn_id(), "WebSocket error");
                break;
            }
        }
    }

    handler.cleanup().await;
    sender_task.abort();
    tracing::info!(conn_id = %handler.conn_id(), "WebSocket connection closed");
}

/// A malformed frame is answered with an `error` event; the connection
/// stays open.
async fn handle_message(handler: &mut SessionHandler, message: Message) {
    if let Ok(text) = message.to_str() {
        tracing::debug!("Received client event: {}", text);

        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                handler.handle_event(event).await;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    raw_message = %text,
                    "Failed to parse client event"
                );
                handler.send(&ServerEvent::Error {
                    message: ServerError::invalid_payload(e.to_string()).to_string(),
                });
            }
        }
    }
}
