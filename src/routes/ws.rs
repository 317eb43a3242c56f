//! WebSocket handler: the relay's per-connection actor.
//!
//! DESIGN
//! ======
//! The token is checked before upgrade; a bad token gets `401` and never
//! reaches the protocol. After upgrade the socket is split. A writer task
//! drains the connection's outbound queue into the sink, while this task
//! reads inbound frames one at a time and awaits each envelope's handling
//! before reading the next.
//!
//! LIFECYCLE
//! =========
//! 1. Verify token → upgrade → register connection (no rooms yet)
//! 2. Inbound text → decode → `services::room::handle_envelope`
//! 3. Close or error → unregister → refresh presence in joined rooms

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wire::{Envelope, decode_envelope, encode_envelope};

use crate::services::auth::Participant;
use crate::services::room;
use crate::state::{AppState, ConnectionId};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token").filter(|t| !t.is_empty()) else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let participant = match state.tokens.verify(token).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response(),
        Err(e) => {
            error!(error = %e, "ws token verification failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "token verification error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, participant))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(socket: WebSocket, state: AppState, participant: Participant) {
    let (tx, rx) = mpsc::channel::<Envelope>(state.config.client_queue_capacity);
    let conn_id = state.registry.lock().await.register(participant.clone(), tx);
    info!(%conn_id, user_id = %participant.id, "ws: client connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, rx, conn_id));

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => process_inbound_text(&state, conn_id, &participant, text.as_str()).await,
            Ok(Message::Binary(_)) => warn!(%conn_id, "ws: binary frame ignored"),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(%conn_id, error = %e, "ws: read failed");
                break;
            }
        }
    }

    // Unregistering drops the queue's sender, which ends the writer.
    room::disconnect(&state, conn_id).await;
    if let Err(e) = writer.await {
        warn!(%conn_id, error = %e, "ws: writer task failed");
    }
    info!(%conn_id, "ws: client disconnected");
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Envelope>,
    conn_id: ConnectionId,
) {
    while let Some(envelope) = rx.recv().await {
        let text = match encode_envelope(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!(%conn_id, error = %e, "ws: encode failed");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!(%conn_id, error = %e, "ws: send failed");
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(%conn_id, error = %e, "ws: close failed");
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode one inbound text frame and route it. Undecodable text is logged
/// and dropped; the connection stays open.
async fn process_inbound_text(state: &AppState, conn_id: ConnectionId, participant: &Participant, text: &str) {
    match decode_envelope(text) {
        Ok(envelope) => {
            debug!(%conn_id, kind = envelope.kind(), "ws: recv");
            room::handle_envelope(state, conn_id, participant, envelope).await;
        }
        Err(e) => warn!(%conn_id, error = %e, "ws: malformed envelope dropped"),
    }
}
