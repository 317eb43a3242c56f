//! Server configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_HISTORY_LIMIT: i64 = wire::DEFAULT_HISTORY_LIMIT;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

/// Upper bound for `?limit=` on the history endpoint.
pub const MAX_HISTORY_LIMIT: i64 = 500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Default page size for `GET /chats/{room_id}`.
    pub history_limit: i64,
    /// Outbound envelopes buffered per connection before drops.
    pub client_queue_capacity: usize,
}

impl Config {
    /// Build config from the process environment.
    ///
    /// Required: `DATABASE_URL`.
    ///
    /// Optional (unparseable values fall back to the default):
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `HISTORY_LIMIT`: default 50, clamped to 1..=500
    /// - `CLIENT_QUEUE_CAPACITY`: default 256, minimum 1
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            history_limit: clamp_history_limit(parse_or(&lookup, "HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)),
            client_queue_capacity: parse_or(&lookup, "CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY).max(1),
        })
    }
}

/// Clamp a requested history page size into the accepted range.
#[must_use]
pub fn clamp_history_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_HISTORY_LIMIT)
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
