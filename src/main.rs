mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::services::auth::PgTokenVerifier;
use crate::services::shapes::PgShapeRepository;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    let port = config.port;

    let state = state::AppState::new(
        Arc::new(PgShapeRepository::new(pool.clone())),
        Arc::new(PgTokenVerifier::new(pool)),
        config,
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "drawsync listening");
    axum::serve(listener, app).await?;
    Ok(())
}
