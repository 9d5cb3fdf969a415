//! Client and server events.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}`.
//! Server frames are wrapped in an [`Envelope`] that adds a top-level
//! `timestamp` in milliseconds since the Unix epoch.

use serde::{Deserialize, Serialize};

use crate::{
    ActionRecord, ActionType, HealthUpdate, LeaderboardEntry, PlayerId,
    Question, Room, RoomConfigPatch, RoomId,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A request sent by a player's client.
///
/// `#[serde(tag = "event", content = "data")]` produces the adjacently
/// tagged form the browser client speaks:
/// `{"event": "join_room", "data": {"username": "ada", "roomId": "k3x9a0q"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    CreateRoom {
        username: String,
        room_name: String,
        #[serde(default)]
        config: Option<RoomConfigPatch>,
    },
    JoinRoom {
        username: String,
        room_id: RoomId,
    },
    QuickJoin {
        username: String,
    },
    LeaveRoom {},
    UpdateSettings {
        room_id: RoomId,
        config: RoomConfigPatch,
    },
    DeleteRoom {
        room_id: RoomId,
    },
    /// Host-only: bring a finished room back to the lobby.
    ContinueGame {
        room_id: RoomId,
    },
    StartGame {
        room_id: RoomId,
    },
    GetQuestion {
        room_id: RoomId,
    },
    SubmitAnswer {
        room_id: RoomId,
        question_id: String,
        answer: Vec<i64>,
    },
    PerformAction {
        room_id: RoomId,
        action_type: ActionType,
        #[serde(default)]
        target_player_id: Option<PlayerId>,
    },
}

impl ClientEvent {
    /// The wire name of this event. Used as the rate-limit bucket.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateRoom { .. } => "create_room",
            ClientEvent::JoinRoom { .. } => "join_room",
            ClientEvent::QuickJoin { .. } => "quick_join",
            ClientEvent::LeaveRoom {} => "leave_room",
            ClientEvent::UpdateSettings { .. } => "update_settings",
            ClientEvent::DeleteRoom { .. } => "delete_room",
            ClientEvent::ContinueGame { .. } => "continue_game",
            ClientEvent::StartGame { .. } => "start_game",
            ClientEvent::GetQuestion { .. } => "get_question",
            ClientEvent::SubmitAnswer { .. } => "submit_answer",
            ClientEvent::PerformAction { .. } => "perform_action",
        }
    }

    /// The display name a joining event asks for, if any.
    pub fn requested_username(&self) -> Option<&str> {
        match self {
            ClientEvent::CreateRoom { username, .. }
            | ClientEvent::JoinRoom { username, .. }
            | ClientEvent::QuickJoin { username } => Some(username),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A notification produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    // -- Room lifecycle --
    RoomCreated {
        room: Room,
    },
    RoomJoined {
        room: Room,
    },
    RoomLeft {
        room_id: RoomId,
    },
    RoomUpdated {
        room: Room,
    },
    PlayerJoined {
        room_id: RoomId,
        player_id: PlayerId,
        username: String,
    },
    PlayerLeft {
        room_id: RoomId,
        player_id: PlayerId,
    },
    NoRoomsAvailable {},
    RoomDeleted {
        room_id: RoomId,
    },

    // -- Game flow --
    GameStarted {
        room: Room,
    },
    GameEnded {
        room_id: RoomId,
    },
    QuestionReceived {
        question: Question,
    },
    AnswerResult {
        correct: bool,
        can_perform_action: bool,
    },
    ActionPerformed {
        action: ActionRecord,
    },
    HealthUpdated {
        updates: Vec<HealthUpdate>,
    },
    PlayerEliminated {
        player_id: PlayerId,
    },
    LeaderboardUpdated {
        leaderboard: Vec<LeaderboardEntry>,
        game_winner: Option<LeaderboardEntry>,
    },

    /// Delivered only to the connection whose request failed.
    Error {
        error: String,
        code: String,
    },
}

impl ServerEvent {
    /// Builds an [`ServerEvent::Error`] from a machine code and a message.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: message.into(),
            code: code.to_string(),
        }
    }
}

/// An outbound frame: the event plus a server timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: ServerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_event_join_room_json_format() {
        let json = r#"{"event":"join_room","data":{"username":"ada","roomId":"abc1234"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                username: "ada".into(),
                room_id: RoomId::from("abc1234"),
            }
        );
        assert_eq!(event.name(), "join_room");
        assert_eq!(event.requested_username(), Some("ada"));
    }

    #[test]
    fn test_client_event_create_room_without_config() {
        let json = r#"{"event":"create_room","data":{"username":"ada","roomName":"fun"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::CreateRoom { config: None, .. }));
    }

    #[test]
    fn test_client_event_create_room_with_partial_config() {
        let json = r#"{"event":"create_room","data":{"username":"ada","roomName":"fun","config":{"difficulty":"hard"}}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        let ClientEvent::CreateRoom { config: Some(patch), .. } = event else {
            panic!("expected create_room with config");
        };
        assert_eq!(patch.difficulty, Some(Difficulty::Hard));
        assert_eq!(patch.time_limit, None);
    }

    #[test]
    fn test_client_event_leave_room_with_empty_data() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"leave_room","data":{}}"#).unwrap();
        assert_eq!(event, ClientEvent::LeaveRoom {});
        assert_eq!(event.requested_username(), None);
    }

    #[test]
    fn test_client_event_submit_answer_json_format() {
        let json = r#"{"event":"submit_answer","data":{"roomId":"r","questionId":"q","answer":[2,3]}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::SubmitAnswer {
                room_id: RoomId::from("r"),
                question_id: "q".into(),
                answer: vec![2, 3],
            }
        );
    }

    #[test]
    fn test_client_event_heal_without_target() {
        let json = r#"{"event":"perform_action","data":{"roomId":"r","actionType":"heal"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::PerformAction {
                room_id: RoomId::from("r"),
                action_type: ActionType::Heal,
                target_player_id: None,
            }
        );
    }

    #[test]
    fn test_client_event_unknown_name_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event":"fly","data":{}}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerEvent / Envelope
    // =====================================================================

    #[test]
    fn test_envelope_flattens_event_next_to_timestamp() {
        let env = Envelope {
            timestamp: 1_700_000_000_000,
            event: ServerEvent::AnswerResult {
                correct: true,
                can_perform_action: true,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
        assert_eq!(json["event"], "answer_result");
        assert_eq!(json["data"]["canPerformAction"], true);

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_server_event_error_json_format() {
        let event = ServerEvent::error("ROOM_FULL", "room abc is full");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["code"], "ROOM_FULL");
        assert_eq!(json["data"]["error"], "room abc is full");
    }

    #[test]
    fn test_server_event_health_updated_json_format() {
        let event = ServerEvent::HealthUpdated {
            updates: vec![HealthUpdate {
                player_id: PlayerId(3),
                new_health: 12,
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "health_updated");
        assert_eq!(json["data"]["updates"][0]["playerId"], 3);
        assert_eq!(json["data"]["updates"][0]["newHealth"], 12);
    }

    #[test]
    fn test_server_event_leaderboard_without_winner() {
        let event = ServerEvent::LeaderboardUpdated {
            leaderboard: vec![],
            game_winner: None,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert!(json["data"]["gameWinner"].is_null());
    }
}
