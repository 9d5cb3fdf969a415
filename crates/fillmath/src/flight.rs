//! Single-flight guard for answer submissions.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use fillmath_protocol::PlayerId;

/// Tracks which players have an answer being processed.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<PlayerId>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `player_id` as busy. `None` if they already are.
    pub fn try_acquire(&self, player_id: PlayerId) -> Option<FlightGuard> {
        if lock(&self.in_flight).insert(player_id) {
            Some(FlightGuard {
                player_id,
                in_flight: Arc::clone(&self.in_flight),
            })
        } else {
            None
        }
    }

    pub fn is_in_flight(&self, player_id: PlayerId) -> bool {
        lock(&self.in_flight).contains(&player_id)
    }
}

/// Held while an answer is processed. Dropping it frees the player.
#[derive(Debug)]
pub struct FlightGuard {
    player_id: PlayerId,
    in_flight: Arc<Mutex<HashSet<PlayerId>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.player_id);
    }
}

// The set stays consistent even if a holder panicked, so poisoning is
// ignored.
fn lock(set: &Mutex<HashSet<PlayerId>>) -> MutexGuard<'_, HashSet<PlayerId>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_second_attempt_fails() {
        let flights = SingleFlight::new();
        let guard = flights.try_acquire(PlayerId(1));
        assert!(guard.is_some());
        assert!(flights.try_acquire(PlayerId(1)).is_none());
        assert!(flights.is_in_flight(PlayerId(1)));
    }

    #[test]
    fn test_guard_drop_releases() {
        let flights = SingleFlight::new();
        {
            let _guard = flights.try_acquire(PlayerId(1)).unwrap();
        }
        assert!(!flights.is_in_flight(PlayerId(1)));
        assert!(flights.try_acquire(PlayerId(1)).is_some());
    }

    #[test]
    fn test_players_are_independent() {
        let flights = SingleFlight::new();
        let _a = flights.try_acquire(PlayerId(1)).unwrap();
        assert!(flights.try_acquire(PlayerId(2)).is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let flights = SingleFlight::new();
        let other = flights.clone();
        let _guard = flights.try_acquire(PlayerId(7)).unwrap();
        assert!(other.try_acquire(PlayerId(7)).is_none());
    }
}
