//! Router assembly.
//!
//! One Axum router serves the websocket relay at `/ws`, the storage routes
//! the client uses for history, drag commits and erases, and `/healthz`.

pub mod auth;
pub mod shapes;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/chats/{room_id}", get(shapes::history))
        .route(
            "/shapes/{room_id}/{shape_id}",
            put(shapes::update_shape).delete(shapes::delete_shape),
        )
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
