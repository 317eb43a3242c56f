//! Room relay: membership, presence, and envelope fan-out.
//!
//! DESIGN
//! ======
//! Each connection task calls into this module once per inbound envelope and
//! awaits it before reading the next, so a sender's envelopes are relayed in
//! the order it sent them. The only await outside the registry lock is the
//! storage call for `chat`; the broadcast that follows it takes the lock
//! again, so a sender's later `update` for the same shape cannot overtake
//! the creation echo.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use tracing::{debug, error, info, warn};
use wire::{Envelope, ShapeMessage};

use crate::services::auth::Participant;
use crate::services::shapes::check_id;
use crate::state::{AppState, ConnectionId};

/// Route one decoded envelope from `conn_id`.
pub async fn handle_envelope(state: &AppState, conn_id: ConnectionId, participant: &Participant, envelope: Envelope) {
    match envelope {
        Envelope::JoinRoom { room_id } => join_room(state, conn_id, &room_id).await,
        Envelope::LeaveRoom { room_id } => leave_room(state, conn_id, &room_id).await,
        Envelope::Chat { id, room_id, message, client_msg_id } => {
            if id.is_some() {
                debug!(%conn_id, %room_id, "relay: ignoring client-supplied chat id");
            }
            relay_chat(state, conn_id, participant, room_id, message, client_msg_id).await;
        }
        env @ (Envelope::Update { .. } | Envelope::Delete { .. }) => relay_notify(state, conn_id, &env).await,
        Envelope::RoomUsers { .. } => {
            warn!(%conn_id, "relay: ignoring client-sent room_users");
        }
    }
}

/// Add the connection to `room_id` and refresh the room's presence.
pub async fn join_room(state: &AppState, conn_id: ConnectionId, room_id: &str) {
    let mut registry = state.registry.lock().await;
    if !registry.join(conn_id, room_id) {
        debug!(%conn_id, %room_id, "relay: already joined");
    }
    let recipients = registry.broadcast_presence(room_id);
    info!(%conn_id, %room_id, recipients, "relay: joined room");
}

/// Remove the connection from `room_id` only and refresh presence for the
/// members that remain.
pub async fn leave_room(state: &AppState, conn_id: ConnectionId, room_id: &str) {
    let mut registry = state.registry.lock().await;
    if !registry.leave(conn_id, room_id) {
        debug!(%conn_id, %room_id, "relay: leave for room not joined");
        return;
    }
    let recipients = registry.broadcast_presence(room_id);
    info!(%conn_id, %room_id, recipients, "relay: left room");
}

/// Persist a shape creation and echo it, with its storage id, to every
/// member of the room including the sender. Returns the assigned id.
pub async fn relay_chat(
    state: &AppState,
    conn_id: ConnectionId,
    participant: &Participant,
    room_id: String,
    message: String,
    client_msg_id: Option<String>,
) -> Option<i64> {
    if let Err(e) = ShapeMessage::decode(&message) {
        warn!(%conn_id, %room_id, error = %e, "relay: chat message is not a shape, dropping");
        return None;
    }

    let id = match state.shapes.create(&room_id, &message, participant.id).await {
        Ok(id) => id,
        Err(e) => {
            error!(%conn_id, %room_id, error = %e, "relay: shape create failed, no echo");
            return None;
        }
    };

    let echo = Envelope::Chat { id: Some(id), room_id, message, client_msg_id };
    let registry = state.registry.lock().await;
    if let Some(room_id) = echo.room_id() {
        let recipients = registry.broadcast(room_id, &echo);
        info!(%conn_id, %room_id, shape_id = id, recipients, "relay: shape created");
    }
    Some(id)
}

/// Fan out an `update` or `delete` to every member of its room. Storage has
/// already been written by the sender over HTTP, so only storage ids pass.
pub async fn relay_notify(state: &AppState, conn_id: ConnectionId, envelope: &Envelope) {
    let (Envelope::Update { room_id, shape_id, .. } | Envelope::Delete { room_id, shape_id }) = envelope else {
        return;
    };
    if let Err(e) = check_id(*shape_id) {
        warn!(%conn_id, %room_id, error = %e, "relay: notify for unstored shape, dropping");
        return;
    }
    let registry = state.registry.lock().await;
    let recipients = registry.broadcast(room_id, envelope);
    debug!(%conn_id, %room_id, kind = envelope.kind(), recipients, "relay: notify");
}

/// Drop a closed connection and refresh presence in every room it had joined.
pub async fn disconnect(state: &AppState, conn_id: ConnectionId) {
    let mut registry = state.registry.lock().await;
    let Some(conn) = registry.unregister(conn_id) else {
        return;
    };
    for room_id in &conn.rooms {
        registry.broadcast_presence(room_id);
    }
    info!(%conn_id, rooms = conn.rooms.len(), "relay: connection closed");
}
