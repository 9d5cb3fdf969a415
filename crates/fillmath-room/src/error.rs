//! Error types for the room layer.

use fillmath_protocol::{PlayerId, RoomId};

/// Why a room operation was refused.
///
/// Every variant except [`RoomError::Internal`] describes a request the
/// client can correct; the engine reports it to the requesting connection
/// only and leaves room state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room is mid-game and does not accept this request.
    #[error("room {0} already has a game in progress")]
    GameInProgress(RoomId),

    /// No free seats.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// A host-only request came from someone else.
    #[error("player {0} is not the host of room {1}")]
    NotHost(PlayerId, RoomId),

    /// The player is not seated in the room named by the request.
    #[error("player {0} is not in that room")]
    NotInRoom(PlayerId),

    /// The player must leave their current room first.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    #[error("invalid room settings: {0}")]
    InvalidConfig(String),

    #[error("room {room_id} needs at least {needed} players to start")]
    NotEnoughPlayers { room_id: RoomId, needed: usize },

    /// The room's status doesn't allow this request (e.g. asking for a
    /// question in the lobby).
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    #[error("player {0} has no question to answer")]
    NoActiveQuestion(PlayerId),

    /// The answer names a question other than the outstanding one.
    #[error("question {question_id} is no longer active")]
    StaleQuestion { question_id: String },

    #[error("player {0} has been eliminated")]
    PlayerEliminated(PlayerId),

    /// An attack or heal without a preceding correct answer.
    #[error("player {0} must answer a question correctly first")]
    ActionNotAllowed(PlayerId),

    /// An attack without a living opponent in the same room as its target.
    #[error("attack target is not a living opponent in this room")]
    TargetNotFound,

    /// Something went wrong inside the engine. Details are logged, not sent.
    #[error("internal error")]
    Internal,

    /// The engine task has stopped.
    #[error("session engine is not running")]
    Unavailable,
}

impl RoomError {
    /// Machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "ROOM_NOT_FOUND",
            RoomError::GameInProgress(_) => "GAME_IN_PROGRESS",
            RoomError::RoomFull(_) => "ROOM_FULL",
            RoomError::NotHost(..) => "NOT_HOST",
            RoomError::NotInRoom(_) => "NOT_IN_ROOM",
            RoomError::AlreadyInRoom(..) => "ALREADY_IN_ROOM",
            RoomError::InvalidConfig(_) => "INVALID_CONFIG",
            RoomError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            RoomError::InvalidState(_) => "INVALID_STATE",
            RoomError::NoActiveQuestion(_) => "NO_ACTIVE_QUESTION",
            RoomError::StaleQuestion { .. } => "STALE_QUESTION",
            RoomError::PlayerEliminated(_) => "PLAYER_ELIMINATED",
            RoomError::ActionNotAllowed(_) => "ACTION_NOT_ALLOWED",
            RoomError::TargetNotFound => "TARGET_NOT_FOUND",
            RoomError::Internal | RoomError::Unavailable => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_matches_variant() {
        let room = RoomId::from("abc1234");
        assert_eq!(RoomError::NotFound(room.clone()).code(), "ROOM_NOT_FOUND");
        assert_eq!(RoomError::RoomFull(room.clone()).code(), "ROOM_FULL");
        assert_eq!(RoomError::NotHost(PlayerId(1), room).code(), "NOT_HOST");
        assert_eq!(RoomError::Internal.code(), "INTERNAL");
    }

    #[test]
    fn test_internal_message_hides_details() {
        assert_eq!(RoomError::Internal.to_string(), "internal error");
    }

    #[test]
    fn test_messages_name_the_room() {
        let err = RoomError::GameInProgress(RoomId::from("zz9"));
        assert!(err.to_string().contains("zz9"));
    }
}
