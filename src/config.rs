use tracing::debug;

use crate::{auth::token::TokenConfig, message::MAX_HISTORY_LIMIT};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";
const DEFAULT_EXPIRATION_DAYS: i64 = 7;
const DEFAULT_HISTORY_LIMIT: i64 = MAX_HISTORY_LIMIT;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
/// Lowest cost bcrypt accepts; the cheap hashing used by tests
pub const MIN_BCRYPT_COST: u32 = 4;

/// Process configuration read from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Unset means in-memory repositories
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub session_expiration_days: i64,
    pub bcrypt_cost: u32,
    /// Number of messages replayed to a session when it joins a room
    pub history_limit: i64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            session_expiration_days: parse_env("SESSION_EXPIRATION_DAYS")
                .unwrap_or(DEFAULT_EXPIRATION_DAYS),
            bcrypt_cost: bcrypt_cost(parse_env("BCRYPT_COST")),
            history_limit: history_limit(parse_env("HISTORY_LIMIT")),
        };

        debug!(
            bind_addr = %config.bind_addr,
            persistent = config.database_url.is_some(),
            history_limit = config.history_limit,
            "Loaded server configuration"
        );

        config
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.jwt_secret.clone(), self.session_expiration_days)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_expiration_days: DEFAULT_EXPIRATION_DAYS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn bcrypt_cost(configured: Option<u32>) -> u32 {
    configured
        .unwrap_or(DEFAULT_BCRYPT_COST)
        .max(MIN_BCRYPT_COST)
}

/// Non-positive values fall back to the default; anything above the cap is clamped to it
fn history_limit(configured: Option<i64>) -> i64 {
    configured
        .filter(|limit| *limit > 0)
        .map(|limit| limit.min(MAX_HISTORY_LIMIT))
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
