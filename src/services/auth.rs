//! Access-token verification.
//!
//! Every websocket upgrade and every storage route resolves its token to a
//! [`Participant`] through a [`TokenVerifier`]. The Postgres verifier looks
//! the token up in `sessions`, joined to `users` for the display name.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use sqlx::{PgPool, Row};
use uuid::Uuid;
use wire::RoomUser;

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// An authenticated user behind a connection or request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
}

impl Participant {
    #[must_use]
    pub fn room_user(&self) -> RoomUser {
        RoomUser { id: self.id.to_string(), name: self.name.clone() }
    }
}

/// Resolves an opaque access token to its participant.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(None)` for unknown or expired tokens.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the lookup itself fails.
    async fn verify(&self, token: &str) -> Result<Option<Participant>, AuthError>;
}

/// Session-table verifier.
pub struct PgTokenVerifier {
    pool: PgPool,
}

impl PgTokenVerifier {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for PgTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<Participant>, AuthError> {
        let row = sqlx::query(
            r"SELECT u.id, u.name
              FROM sessions s
              JOIN users u ON u.id = s.user_id
              WHERE s.token = $1 AND s.expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Participant { id: r.get("id"), name: r.get("name") }))
    }
}

/// Token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
