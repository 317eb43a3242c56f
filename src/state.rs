//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! owns the connection registry, the only relay-wide mutable table, behind a
//! single `tokio::sync::Mutex`. Every join, leave, broadcast and disconnect
//! runs under that lock, so all members of a room see envelopes in the same
//! order. Storage and token checks sit behind traits so tests can swap in
//! in-memory doubles.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;
use wire::{Envelope, RoomUser};

use crate::config::Config;
use crate::services::auth::{Participant, TokenVerifier};
use crate::services::shapes::ShapeRepository;

pub type ConnectionId = Uuid;

// =============================================================================
// CONNECTION
// =============================================================================

/// One live socket: who is behind it, which rooms it joined, and where its
/// outbound envelopes go.
pub struct Connection {
    pub id: ConnectionId,
    pub participant: Participant,
    pub rooms: HashSet<String>,
    pub tx: mpsc::Sender<Envelope>,
    /// Registration order, used to order presence lists.
    seq: u64,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Table of live connections keyed by connection id.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    next_seq: u64,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with no rooms and return its id.
    pub fn register(&mut self, participant: Participant, tx: mpsc::Sender<Envelope>) -> ConnectionId {
        let id = Uuid::new_v4();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.connections.insert(id, Connection { id, participant, rooms: HashSet::new(), tx, seq });
        id
    }

    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Add `room` to the connection's set. Returns whether it was new.
    pub fn join(&mut self, id: ConnectionId, room: &str) -> bool {
        self.connections
            .get_mut(&id)
            .is_some_and(|conn| conn.rooms.insert(room.to_owned()))
    }

    /// Remove exactly `room` from the connection's set, leaving every other
    /// membership intact. Returns whether it was present.
    pub fn leave(&mut self, id: ConnectionId, room: &str) -> bool {
        self.connections
            .get_mut(&id)
            .is_some_and(|conn| conn.rooms.remove(room))
    }

    /// Members of `room` in registration order.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<&Connection> {
        let mut members: Vec<&Connection> = self
            .connections
            .values()
            .filter(|conn| conn.rooms.contains(room))
            .collect();
        members.sort_by_key(|conn| conn.seq);
        members
    }

    /// Participants in `room`, once each, in order of their first connection.
    #[must_use]
    pub fn presence(&self, room: &str) -> Vec<RoomUser> {
        let mut seen = HashSet::new();
        self.members(room)
            .into_iter()
            .filter(|conn| seen.insert(conn.participant.id))
            .map(|conn| conn.participant.room_user())
            .collect()
    }

    /// Queue `envelope` for every member of `room`. A member whose queue is
    /// full or closed misses this envelope. Returns how many were queued.
    pub fn broadcast(&self, room: &str, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for conn in self.members(room) {
            match conn.tx.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(conn_id = %conn.id, %room, kind = envelope.kind(), "relay: outbound queue full, dropping");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %conn.id, %room, "relay: outbound queue closed");
                }
            }
        }
        delivered
    }

    /// Broadcast the current presence list of `room` to its members.
    pub fn broadcast_presence(&self, room: &str) -> usize {
        let envelope = Envelope::RoomUsers { users: self.presence(room) };
        self.broadcast(room, &envelope)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Mutex<Registry>>,
    pub shapes: Arc<dyn ShapeRepository>,
    pub tokens: Arc<dyn TokenVerifier>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(shapes: Arc<dyn ShapeRepository>, tokens: Arc<dyn TokenVerifier>, config: Config) -> Self {
        Self { registry: Arc::new(Mutex::new(Registry::new())), shapes, tokens, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
