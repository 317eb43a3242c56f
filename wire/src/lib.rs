//! Shared envelope model and JSON codec for the realtime relay.
//!
//! This crate owns the wire representation used by both the relay server and
//! the client store. Every message on the socket is one [`Envelope`], a JSON
//! object discriminated by its `type` field. Shape geometry travels as a
//! closed [`ShapePayload`] sum type so every consumer has to match every kind.
//!
//! The `message` field of a chat envelope is itself JSON text of a
//! [`ShapeMessage`] (`{"shape": {...}}`); storage keeps that text verbatim.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of history rows a client asks for when it opens a room.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Error returned by the codec helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Text was not valid JSON or did not match the expected shape.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Geometry of one drawable primitive. Tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapePayload {
    /// Axis-aligned rectangle anchored at its top-left corner.
    Rect { x: f64, y: f64, width: f64, height: f64 },
    /// Circle given by center and radius. Radius may be negative when drawn
    /// up-and-left; consumers use its absolute value.
    Circle {
        #[serde(rename = "centerX")]
        center_x: f64,
        #[serde(rename = "centerY")]
        center_y: f64,
        radius: f64,
    },
    /// Isosceles triangle: base from `(x, y)` to `(x + width, y)`, apex at
    /// `(x + width / 2, y + height)`.
    Triangle { x: f64, y: f64, width: f64, height: f64 },
    /// Freehand stroke through the ordered points.
    Pencil { points: Vec<Point> },
    /// Text box with optional font and color.
    Text {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
}

impl ShapePayload {
    /// The wire `type` tag of this shape.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rect { .. } => "rect",
            Self::Circle { .. } => "circle",
            Self::Triangle { .. } => "triangle",
            Self::Pencil { .. } => "pencil",
            Self::Text { .. } => "text",
        }
    }

    /// Move the shape by `(dx, dy)` in place.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Self::Rect { x, y, .. } | Self::Triangle { x, y, .. } | Self::Text { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            Self::Circle { center_x, center_y, .. } => {
                *center_x += dx;
                *center_y += dy;
            }
            Self::Pencil { points } => {
                for p in points {
                    p.x += dx;
                    p.y += dy;
                }
            }
        }
    }
}

/// Body of a chat envelope's `message` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMessage {
    pub shape: ShapePayload,
}

impl ShapeMessage {
    #[must_use]
    pub fn new(shape: ShapePayload) -> Self {
        Self { shape }
    }

    /// Serialize to the JSON text carried in `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a `message` string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the text is not a `{"shape": ...}` object
    /// with a known shape type.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// One participant in a room presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: String,
    pub name: String,
}

/// A single message on the realtime socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Client asks to receive a room's traffic.
    JoinRoom {
        #[serde(rename = "roomId", deserialize_with = "lenient_room_id")]
        room_id: String,
    },
    /// Client stops receiving a room's traffic.
    LeaveRoom {
        #[serde(rename = "roomId", deserialize_with = "lenient_room_id")]
        room_id: String,
    },
    /// Shape creation. Clients send it without `id`; the relay echoes it with
    /// the storage-assigned `id` and the client's `clientMsgId` untouched.
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        #[serde(rename = "roomId", deserialize_with = "lenient_room_id")]
        room_id: String,
        message: String,
        #[serde(rename = "clientMsgId", default, skip_serializing_if = "Option::is_none")]
        client_msg_id: Option<String>,
    },
    /// A persisted shape was removed.
    Delete {
        #[serde(rename = "roomId", deserialize_with = "lenient_room_id")]
        room_id: String,
        #[serde(rename = "shapeId", deserialize_with = "lenient_shape_id")]
        shape_id: i64,
    },
    /// A persisted shape changed geometry.
    Update {
        #[serde(rename = "roomId", deserialize_with = "lenient_room_id")]
        room_id: String,
        #[serde(rename = "shapeId", deserialize_with = "lenient_shape_id")]
        shape_id: i64,
        shape: ShapePayload,
    },
    /// Presence snapshot for one room. Relay to clients only.
    RoomUsers { users: Vec<RoomUser> },
}

impl Envelope {
    /// The `type` tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Chat { .. } => "chat",
            Self::Delete { .. } => "delete",
            Self::Update { .. } => "update",
            Self::RoomUsers { .. } => "room_users",
        }
    }

    /// Room this envelope addresses, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Chat { room_id, .. }
            | Self::Delete { room_id, .. }
            | Self::Update { room_id, .. } => Some(room_id),
            Self::RoomUsers { .. } => None,
        }
    }
}

/// Encode an envelope as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, CodecError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode JSON text into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for unparseable text, unknown `type` tags, or
/// missing required fields.
pub fn decode_envelope(text: &str) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Room ids are strings, but older clients send bare integers.
fn lenient_room_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Number(n) => n.to_string(),
    })
}

/// Shape ids are integers, but some clients send them as numeric strings.
fn lenient_shape_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(n),
        Repr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid shape id: {s:?}"))),
    }
}

// =============================================================================
// STORAGE API BODIES
// =============================================================================

/// Author attribution on a history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

/// One stored creation, as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}

/// Response body of `GET /chats/{room_id}`. Rows are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryRow>,
}

/// Request body of `PUT /shapes/{room_id}/{shape_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateShapeBody {
    pub shape: ShapePayload,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
