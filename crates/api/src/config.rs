use std::time::Duration;

use aether_booking::BookingPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Per-session realtime queue depth (default: `256`).
    pub room_buffer: usize,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
    pub booking: BookingConfig,
}

/// Booking tunables, mapped onto [`BookingPolicy`].
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Reject booking requests that carry no branch.
    pub require_branch: bool,
    /// How long a writer waits for the per-day lock before answering busy.
    pub lock_wait_ms: u64,
    /// Maximum alternates returned with a slot conflict.
    pub suggestion_limit: usize,
    /// Days after the requested date searched for alternates.
    pub lookahead_days: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `ROOM_BUFFER`               | `256`                   |
    /// | `LOG_FORMAT`                | `text` (or `json`)      |
    /// | `REQUIRE_BRANCH`            | `false`                 |
    /// | `BOOKING_LOCK_WAIT_MS`      | `2000`                  |
    /// | `SUGGESTION_LIMIT`          | `3`                     |
    /// | `SUGGESTION_LOOKAHEAD_DAYS` | `7`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let room_buffer: usize = std::env::var("ROOM_BUFFER")
            .unwrap_or_else(|_| aether_events::DEFAULT_ROOM_BUFFER.to_string())
            .parse()
            .expect("ROOM_BUFFER must be a valid usize");

        let log_json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            room_buffer,
            log_json,
            booking: BookingConfig::from_env(),
        }
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            require_branch: self.booking.require_branch,
            lock_wait: Duration::from_millis(self.booking.lock_wait_ms),
            suggestion_limit: self.booking.suggestion_limit,
            lookahead_days: self.booking.lookahead_days,
        }
    }
}

impl BookingConfig {
    fn from_env() -> Self {
        let require_branch: bool = std::env::var("REQUIRE_BRANCH")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("REQUIRE_BRANCH must be true or false");

        let lock_wait_ms: u64 = std::env::var("BOOKING_LOCK_WAIT_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("BOOKING_LOCK_WAIT_MS must be a valid u64");

        let suggestion_limit: usize = std::env::var("SUGGESTION_LIMIT")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("SUGGESTION_LIMIT must be a valid usize");

        let lookahead_days: u32 = std::env::var("SUGGESTION_LOOKAHEAD_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse()
            .expect("SUGGESTION_LOOKAHEAD_DAYS must be a valid u32");

        Self {
            require_branch,
            lock_wait_ms,
            suggestion_limit,
            lookahead_days,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        let policy = BookingPolicy::default();
        Self {
            require_branch: policy.require_branch,
            lock_wait_ms: policy.lock_wait.as_millis() as u64,
            suggestion_limit: policy.suggestion_limit,
            lookahead_days: policy.lookahead_days,
        }
    }
}
