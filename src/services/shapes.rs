//! Shape storage: the durable record of every shape created in a room.
//!
//! DESIGN
//! ======
//! A shape row keeps the exact `message` text the creator sent (the JSON of
//! `{"shape": …}`), so history replays byte-for-byte what peers saw. Updates
//! rewrite `message` from the new payload. Ids are assigned by storage and
//! are always positive.

#[cfg(test)]
#[path = "shapes_test.rs"]
mod shapes_test;

use sqlx::{PgPool, Row};
use uuid::Uuid;
use wire::{Author, CodecError, HistoryRow, ShapeMessage, ShapePayload};

use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("shape {id} not found in room {room_id}")]
    NotFound { room_id: String, id: i64 },
    #[error("invalid shape id: {0}")]
    InvalidId(i64),
    #[error("encode error: {0}")]
    Codec(#[from] CodecError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ShapeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_SHAPE_NOT_FOUND",
            Self::InvalidId(_) => "E_INVALID_SHAPE_ID",
            Self::Codec(_) => "E_CODEC",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Durable shape storage for rooms.
#[async_trait::async_trait]
pub trait ShapeRepository: Send + Sync {
    /// Store a new shape message and return its assigned id.
    async fn create(&self, room_id: &str, message: &str, author_id: Uuid) -> Result<i64, ShapeError>;

    /// Up to `limit` rows for the room, newest first.
    async fn list(&self, room_id: &str, limit: i64) -> Result<Vec<HistoryRow>, ShapeError>;

    /// Replace the stored geometry of one shape.
    async fn update(&self, room_id: &str, id: i64, shape: &ShapePayload) -> Result<(), ShapeError>;

    async fn delete(&self, room_id: &str, id: i64) -> Result<(), ShapeError>;
}

/// Reject ids storage can never have assigned.
///
/// # Errors
///
/// Returns [`ShapeError::InvalidId`] for zero or negative ids.
pub fn check_id(id: i64) -> Result<i64, ShapeError> {
    if id <= 0 {
        return Err(ShapeError::InvalidId(id));
    }
    Ok(id)
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgShapeRepository {
    pool: PgPool,
}

impl PgShapeRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ShapeRepository for PgShapeRepository {
    async fn create(&self, room_id: &str, message: &str, author_id: Uuid) -> Result<i64, ShapeError> {
        let id: i64 = sqlx::query_scalar("INSERT INTO shapes (room_id, message, author_id) VALUES ($1, $2, $3) RETURNING id")
            .bind(room_id)
            .bind(message)
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list(&self, room_id: &str, limit: i64) -> Result<Vec<HistoryRow>, ShapeError> {
        let rows = sqlx::query(
            r"SELECT s.id, s.message, u.name AS author_name
              FROM shapes s
              LEFT JOIN users u ON u.id = s.author_id
              WHERE s.room_id = $1
              ORDER BY s.id DESC
              LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| HistoryRow {
                id: r.get("id"),
                message: r.get("message"),
                author: r.get::<Option<String>, _>("author_name").map(|name| Author { name }),
            })
            .collect())
    }

    async fn update(&self, room_id: &str, id: i64, shape: &ShapePayload) -> Result<(), ShapeError> {
        let id = check_id(id)?;
        let message = ShapeMessage::new(shape.clone()).encode()?;
        let result = sqlx::query("UPDATE shapes SET message = $3 WHERE room_id = $1 AND id = $2")
            .bind(room_id)
            .bind(id)
            .bind(message)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShapeError::NotFound { room_id: room_id.to_owned(), id });
        }
        Ok(())
    }

    async fn delete(&self, room_id: &str, id: i64) -> Result<(), ShapeError> {
        let id = check_id(id)?;
        let result = sqlx::query("DELETE FROM shapes WHERE room_id = $1 AND id = $2")
            .bind(room_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ShapeError::NotFound { room_id: room_id.to_owned(), id });
        }
        Ok(())
    }
}
