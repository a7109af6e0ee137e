// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Percentage an attempt must reach to count as passed.
pub const PASSING_SCORE_PERCENTAGE: f64 = 60.0;

/// Recorded answer value meaning "no option selected".
/// Never equal to a valid option index.
pub const NO_ANSWER: i32 = -1;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Upper bound for an exam set's time limit, in minutes.
pub const MAX_TIME_LIMIT_MINUTES: i32 = 600;

/// Age after which an open attempt session is dropped. Longer than any time limit.
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 12 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When absent the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Wall-clock length of one countdown tick.
    pub tick_interval_ms: u64,
    /// Open attempt sessions older than this are dropped.
    pub session_max_age_secs: u64,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let tick_interval_ms = env::var("TICK_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(1000);

        let session_max_age_secs = env::var("SESSION_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            tick_interval_ms,
            session_max_age_secs,
            bind_addr,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }
}
