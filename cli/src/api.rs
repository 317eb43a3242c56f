//! HTTP client for the relay's storage routes.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use canvas::doc::ShapeId;
use reqwest::{Method, RequestBuilder, Url};
use wire::{HistoryResponse, HistoryRow, ShapePayload, UpdateShapeBody};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("history unavailable: {0}")]
    HistoryUnavailable(reqwest::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status} for {path}")]
    Status { status: u16, path: String },
}

/// Bearer-authenticated client for `/chats` and `/shapes`. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), token: token.into() }
    }

    /// Fetch a room's stored shapes, newest first.
    ///
    /// # Errors
    ///
    /// Transport and body failures come back as [`ApiError::HistoryUnavailable`];
    /// callers are expected to fall back to an empty room.
    pub async fn history(&self, room_id: &str, limit: Option<i64>) -> Result<Vec<HistoryRow>, ApiError> {
        let mut url = self.endpoint(&["chats", room_id])?;
        if let Some(limit) = limit {
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(ApiError::HistoryUnavailable)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), path: format!("/chats/{room_id}") });
        }
        let body: HistoryResponse = response.json().await.map_err(ApiError::HistoryUnavailable)?;
        Ok(body.messages)
    }

    /// Store new geometry for a confirmed shape.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] when the shape is unknown to storage.
    pub async fn update_shape(&self, room_id: &str, id: ShapeId, shape: &ShapePayload) -> Result<(), ApiError> {
        let url = self.endpoint(&["shapes", room_id, &id.to_string()])?;
        let body = UpdateShapeBody { shape: shape.clone() };
        let response = self.request(Method::PUT, url).json(&body).send().await?;
        expect_success(response.status(), room_id, id)
    }

    /// Remove a confirmed shape from storage.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] when the shape is unknown to storage.
    pub async fn delete_shape(&self, room_id: &str, id: ShapeId) -> Result<(), ApiError> {
        let url = self.endpoint(&["shapes", room_id, &id.to_string()])?;
        let response = self.request(Method::DELETE, url).send().await?;
        expect_success(response.status(), room_id, id)
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url).map_err(|_| ApiError::InvalidBaseUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }
}

fn expect_success(status: reqwest::StatusCode, room_id: &str, id: ShapeId) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }
    Err(ApiError::Status { status: status.as_u16(), path: format!("/shapes/{room_id}/{id}") })
}
