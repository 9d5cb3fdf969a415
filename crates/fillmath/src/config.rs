//! Server configuration.

use std::time::Duration;

use fillmath_room::EngineConfig;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Environment variable overriding the listen address.
pub const ADDR_ENV: &str = "FILLMATH_ADDR";

/// Per-player, per-event rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sliding window length.
    pub window: Duration,
    /// Events of one kind a player may send inside one window.
    pub max_events: usize,
    /// Upper bound on tracked (player, event) keys. When full, the key
    /// used least recently is evicted.
    pub max_tracked_keys: usize,
    /// How often expired entries are swept.
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_events: 10,
            max_tracked_keys: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub engine: EngineConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            engine: EngineConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, with the listen address taken from `FILLMATH_ADDR` when set.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            ..Self::default()
        }
    }
}
