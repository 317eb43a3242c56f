//! Bearer-token extractor for the storage routes.

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::http::request::Parts;
use tracing::error;

use crate::error::ApiError;
use crate::services::auth::{Participant, bearer_token};
use crate::state::AppState;

/// Authenticated participant from `Authorization: Bearer <token>`.
/// Use as a handler parameter to require authentication.
pub struct AuthUser(pub Participant);

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        match app_state.tokens.verify(token).await {
            Ok(Some(participant)) => Ok(Self(participant)),
            Ok(None) => Err(ApiError::unauthorized()),
            Err(e) => {
                error!(error = %e, "token verification failed");
                Err(ApiError::from_error(StatusCode::INTERNAL_SERVER_ERROR, &e))
            }
        }
    }
}
