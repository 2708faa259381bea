//! WebSocket RPC binding.
//!
//! # Data Flow
//! ```text
//! Peer ── binary frame (JSON RequestEnvelope) ──▶ Dispatcher
//! Peer ◀── binary frame (JSON RawReply) ───────── Dispatcher
//! ```
//!
//! # Design Decisions
//! - One request in flight per session; peers pool sessions for parallelism
//! - A malformed frame gets an INVALID reply, the session stays open
//! - Ping/pong handled by axum

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::envelope::{RawReply, RequestEnvelope, ResponseEnvelope, Status};
use crate::server::app::AppState;
use crate::server::dispatcher::Dispatcher;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Upgrade handler for the RPC path.
pub async fn handle_rpc(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let dispatcher = state.dispatcher.clone();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| serve_session(socket, dispatcher))
}

async fn serve_session(mut socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let session = Uuid::new_v4();
    tracing::debug!(session = %session, "RPC session opened");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(session = %session, error = %e, "RPC session read failed");
                break;
            }
        };

        let parsed = match message {
            Message::Binary(bytes) => serde_json::from_slice::<RequestEnvelope>(&bytes),
            Message::Text(text) => serde_json::from_str::<RequestEnvelope>(text.as_str()),
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = reply_to(&dispatcher, parsed).await;
        let payload = match serde_json::to_vec(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(session = %session, error = %e, "Failed to encode reply");
                break;
            }
        };
        if socket.send(Message::Binary(payload.into())).await.is_err() {
            break;
        }
    }

    tracing::debug!(session = %session, "RPC session closed");
}

async fn reply_to(dispatcher: &Dispatcher, parsed: Result<RequestEnvelope, serde_json::Error>) -> RawReply {
    let envelope = match parsed {
        Ok(mut request) => {
            if request.header(X_REQUEST_ID).is_none() {
                request
                    .headers
                    .insert(X_REQUEST_ID.to_string(), Uuid::new_v4().to_string());
            }
            dispatcher.dispatch(request).await
        }
        Err(e) => ResponseEnvelope::error(
            Status::Invalid,
            "INVALID_FRAME",
            format!("Malformed request frame: {e}"),
        ),
    };
    RawReply::from_envelope(&envelope)
}
