//! Sliding-window rate limiter keyed by player and event name.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use fillmath_protocol::PlayerId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::RateLimitConfig;

type Key = (PlayerId, &'static str);

/// Admits at most `max_events` events per (player, event) inside any
/// window of length `window`.
///
/// The table holds at most `max_tracked_keys` entries; admitting a new key
/// into a full table evicts the least recently used one.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<Key, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records an event and returns `true` if it is within the limit.
    /// A rejected event is not recorded.
    pub async fn check(&self, player_id: PlayerId, event: &'static str) -> bool {
        let now = Instant::now();
        let window = self.config.window;
        let mut windows = self.windows.lock().await;

        let key = (player_id, event);
        if !windows.contains_key(&key) && windows.len() >= self.config.max_tracked_keys {
            let oldest = windows
                .iter()
                .min_by_key(|(_, times)| times.last().copied().unwrap_or(now))
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                windows.remove(&oldest);
                tracing::debug!(player_id = %oldest.0, event = oldest.1, "evicted rate-limit entry");
            }
        }

        let times = windows.entry(key).or_default();
        times.retain(|t| now.duration_since(*t) < window);
        if times.len() < self.config.max_events {
            times.push(now);
            true
        } else {
            false
        }
    }

    /// Forgets everything recorded for `player_id`.
    pub async fn release(&self, player_id: PlayerId) {
        self.windows
            .lock()
            .await
            .retain(|(owner, _), _| *owner != player_id);
    }

    /// Drops expired timestamps and empty keys. Returns how many keys were
    /// removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window;
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < window);
            !times.is_empty()
        });
        before - windows.len()
    }

    /// Number of (player, event) keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Starts a task that sweeps every `sweep_interval`. It ends on its own
    /// once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "rate-limit sweep");
                }
            }
        })
    }
}
