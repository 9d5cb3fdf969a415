//! Engine settings and room-config validation.

use std::time::Duration;

use fillmath_clock::ClockConfig;
use fillmath_protocol::RoomConfig;

use crate::RoomError;

/// Fewest players a room may be configured for, and the fewest that can
/// start a game.
pub const MIN_PLAYERS: usize = 2;

/// Settings shared by every room an engine hosts.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Room clock settings. The period is the health-decay interval.
    pub clock: ClockConfig,
    /// Pause between an attack or heal and the actor's next question.
    pub action_delay: Duration,
    /// Score awarded for each correct answer.
    pub points_per_answer: u32,
    /// Seeds the engine's RNG (room ids and questions). `None` seeds from
    /// the OS.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            action_delay: Duration::from_secs(1),
            points_per_answer: 10,
            rng_seed: None,
        }
    }
}

/// Checks a merged room config. `seated` is the current player count; a
/// settings update may not shrink the room below it.
pub fn validate_config(config: &RoomConfig, seated: usize) -> Result<(), RoomError> {
    if config.max_players < MIN_PLAYERS {
        return Err(RoomError::InvalidConfig(format!(
            "maxPlayers must be at least {MIN_PLAYERS}"
        )));
    }
    if config.max_players < seated {
        return Err(RoomError::InvalidConfig(format!(
            "maxPlayers {} is below the {seated} players already seated",
            config.max_players
        )));
    }
    if config.time_limit == 0 {
        return Err(RoomError::InvalidConfig(
            "timeLimit must be at least 1 second".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.clock.period, Duration::from_secs(1));
        assert_eq!(cfg.action_delay, Duration::from_secs(1));
        assert_eq!(cfg.points_per_answer, 10);
    }

    #[test]
    fn test_validate_default_room_config() {
        assert!(validate_config(&RoomConfig::default(), 1).is_ok());
    }

    #[test]
    fn test_validate_rejects_single_seat_room() {
        let cfg = RoomConfig {
            max_players: 1,
            ..RoomConfig::default()
        };
        assert!(matches!(
            validate_config(&cfg, 1),
            Err(RoomError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_shrinking_below_seated() {
        let cfg = RoomConfig {
            max_players: 2,
            ..RoomConfig::default()
        };
        assert!(validate_config(&cfg, 2).is_ok());
        assert!(validate_config(&cfg, 3).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_time_limit() {
        let cfg = RoomConfig {
            time_limit: 0,
            ..RoomConfig::default()
        };
        assert!(validate_config(&cfg, 1).is_err());
    }
}
