//! Integration tests for the engine actor, driven through `EngineHandle`.
//!
//! Time is paused, so room clocks only fire when a test sleeps past a
//! tick boundary.

use std::time::Duration;

use fillmath_protocol::{
    ActionType, ClientEvent, Envelope, PlayerId, Question, RoomConfigPatch, RoomId, RoomStatus,
    ServerEvent,
};
use fillmath_room::{spawn_engine, EngineConfig, EngineHandle, RoomError};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    id: PlayerId,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Client {
    fn connect(engine: &EngineHandle, id: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        engine.connect(PlayerId(id), tx).unwrap();
        Self { id: PlayerId(id), rx }
    }

    /// Everything queued so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    fn last_question(&mut self) -> Question {
        self.drain()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                ServerEvent::QuestionReceived { question } => Some(question),
                _ => None,
            })
            .expect("a question should have been received")
    }
}

fn engine() -> EngineHandle {
    spawn_engine(EngineConfig {
        rng_seed: Some(9),
        ..EngineConfig::default()
    })
}

fn create(name: &str, config: Option<RoomConfigPatch>) -> ClientEvent {
    ClientEvent::CreateRoom {
        username: name.into(),
        room_name: "arena".into(),
        config,
    }
}

fn join(name: &str, room_id: &RoomId) -> ClientEvent {
    ClientEvent::JoinRoom {
        username: name.into(),
        room_id: room_id.clone(),
    }
}

fn created_room_id(events: &[ServerEvent]) -> RoomId {
    events
        .iter()
        .find_map(|e| match e {
            ServerEvent::RoomCreated { room } => Some(room.id.clone()),
            _ => None,
        })
        .expect("room_created")
}

/// Host creates a room, `guest` joins, host starts the game.
async fn started_game(
    engine: &EngineHandle,
    host: &mut Client,
    guest: &mut Client,
    config: Option<RoomConfigPatch>,
) -> RoomId {
    engine.dispatch(host.id, None, create("host", config)).await.unwrap();
    let room_id = created_room_id(&host.drain());
    engine.dispatch(guest.id, None, join("guest", &room_id)).await.unwrap();
    engine
        .dispatch(
            host.id,
            None,
            ClientEvent::StartGame {
                room_id: room_id.clone(),
            },
        )
        .await
        .unwrap();
    room_id
}

async fn answer(engine: &EngineHandle, client: &Client, room_id: &RoomId, q: &Question) {
    engine
        .dispatch(
            client.id,
            None,
            ClientEvent::SubmitAnswer {
                room_id: room_id.clone(),
                question_id: q.id.clone(),
                answer: q.withheld().to_vec(),
            },
        )
        .await
        .unwrap();
}

fn health_of(events: &[ServerEvent], player: PlayerId) -> Option<u32> {
    events.iter().rev().find_map(|e| match e {
        ServerEvent::HealthUpdated { updates } => updates
            .iter()
            .find(|u| u.player_id == player)
            .map(|u| u.new_health),
        _ => None,
    })
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_dispatch_error_reaches_requester_only() {
    let engine = engine();
    let mut a = Client::connect(&engine, 1);
    let mut b = Client::connect(&engine, 2);

    let missing = RoomId::from("missing");
    let result = engine.dispatch(a.id, None, join("a", &missing)).await;
    assert_eq!(result, Err(RoomError::NotFound(missing)));

    let events = a.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::Error { code, error } => {
            assert_eq!(code, "ROOM_NOT_FOUND");
            assert!(error.contains("missing"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(b.drain().is_empty());
}

#[tokio::test]
async fn test_join_broadcasts_to_existing_members() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);

    engine.dispatch(host.id, None, create("host", None)).await.unwrap();
    let room_id = created_room_id(&host.drain());
    engine.dispatch(guest.id, None, join("guest", &room_id)).await.unwrap();

    let host_events = host.drain();
    assert!(matches!(host_events[0], ServerEvent::PlayerJoined { player_id, .. } if player_id == guest.id));
    assert!(matches!(host_events[1], ServerEvent::RoomUpdated { .. }));

    let guest_events = guest.drain();
    assert!(matches!(guest_events[0], ServerEvent::RoomJoined { .. }));
    assert!(matches!(guest_events[1], ServerEvent::RoomUpdated { .. }));
    assert_eq!(guest_events.len(), 2, "joiner does not see their own player_joined");
}

#[tokio::test]
async fn test_envelopes_carry_timestamps() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    engine.dispatch(host.id, None, create("host", None)).await.unwrap();
    let envelope = host.rx.try_recv().unwrap();
    assert!(envelope.timestamp > 0);
}

#[tokio::test]
async fn test_quick_join_picks_public_room() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut seeker = Client::connect(&engine, 2);

    let public = RoomConfigPatch {
        is_public: Some(true),
        ..Default::default()
    };
    engine.dispatch(host.id, None, create("host", Some(public))).await.unwrap();
    let room_id = created_room_id(&host.drain());

    engine
        .dispatch(seeker.id, None, ClientEvent::QuickJoin { username: "s".into() })
        .await
        .unwrap();
    match &seeker.drain()[0] {
        ServerEvent::RoomJoined { room } => assert_eq!(room.id, room_id),
        other => panic!("expected room_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_room_reaches_everyone() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    engine.dispatch(host.id, None, create("host", None)).await.unwrap();
    let room_id = created_room_id(&host.drain());
    engine.dispatch(guest.id, None, join("guest", &room_id)).await.unwrap();
    host.drain();
    guest.drain();

    engine
        .dispatch(host.id, None, ClientEvent::DeleteRoom { room_id: room_id.clone() })
        .await
        .unwrap();
    for client in [&mut host, &mut guest] {
        assert_eq!(
            client.drain(),
            vec![ServerEvent::RoomDeleted {
                room_id: room_id.clone()
            }]
        );
    }
    assert_eq!(engine.room_snapshot(&room_id).await.unwrap(), None);
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_clock_drains_health_every_second() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let room_id = started_game(&engine, &mut host, &mut guest, None).await;
    host.drain();

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let room = engine.room_snapshot(&room_id).await.unwrap().unwrap();
    assert!(room.players.iter().all(|p| p.health == 58));

    let events = host.drain();
    let ticks = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::HealthUpdated { .. }))
        .count();
    assert_eq!(ticks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_game_runs_out_of_time_without_winner() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let short = RoomConfigPatch {
        time_limit: Some(3),
        ..Default::default()
    };
    let room_id = started_game(&engine, &mut host, &mut guest, Some(short)).await;
    host.drain();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let room = engine.room_snapshot(&room_id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::Finished);

    let events = host.drain();
    let n = events.len();
    assert!(matches!(events[n - 1], ServerEvent::GameEnded { .. }));
    match &events[n - 2] {
        ServerEvent::LeaderboardUpdated {
            leaderboard,
            game_winner,
        } => {
            assert_eq!(leaderboard[0].player_id, host.id);
            assert_eq!(leaderboard[1].player_id, guest.id);
            assert!(game_winner.is_none());
        }
        other => panic!("expected leaderboard, got {other:?}"),
    }

    // The clock stopped with the game.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(host.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deleting_running_game_silences_room() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let room_id = started_game(&engine, &mut host, &mut guest, None).await;

    // Leave a deferred question pending as well as the clock.
    let q = host.last_question();
    answer(&engine, &host, &room_id, &q).await;
    engine
        .dispatch(
            host.id,
            None,
            ClientEvent::PerformAction {
                room_id: room_id.clone(),
                action_type: ActionType::Attack,
                target_player_id: Some(guest.id),
            },
        )
        .await
        .unwrap();
    host.drain();
    guest.drain();

    engine
        .dispatch(host.id, None, ClientEvent::DeleteRoom { room_id: room_id.clone() })
        .await
        .unwrap();
    for client in [&mut host, &mut guest] {
        assert_eq!(
            client.drain(),
            vec![ServerEvent::RoomDeleted {
                room_id: room_id.clone()
            }]
        );
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(engine.room_snapshot(&room_id).await.unwrap(), None);
    assert!(host.drain().is_empty());
    assert!(guest.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_answer_then_attack_then_deferred_question() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let room_id = started_game(&engine, &mut host, &mut guest, None).await;

    let q = host.last_question();
    answer(&engine, &host, &room_id, &q).await;
    assert!(host.drain().contains(&ServerEvent::AnswerResult {
        correct: true,
        can_perform_action: true
    }));

    engine
        .dispatch(
            host.id,
            None,
            ClientEvent::PerformAction {
                room_id: room_id.clone(),
                action_type: ActionType::Attack,
                target_player_id: Some(guest.id),
            },
        )
        .await
        .unwrap();
    let events = guest.drain();
    assert_eq!(health_of(&events, guest.id), Some(55));

    // No new question until the action delay has passed.
    assert!(host
        .drain()
        .iter()
        .all(|e| !matches!(e, ServerEvent::QuestionReceived { .. })));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    engine.room_snapshot(&room_id).await.unwrap();
    let next = host.last_question();
    assert_ne!(next.id, q.id);
}

#[tokio::test(start_paused = true)]
async fn test_action_before_answer_is_refused() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let room_id = started_game(&engine, &mut host, &mut guest, None).await;
    host.drain();

    let result = engine
        .dispatch(
            host.id,
            None,
            ClientEvent::PerformAction {
                room_id,
                action_type: ActionType::Heal,
                target_player_id: None,
            },
        )
        .await;
    assert_eq!(result, Err(RoomError::ActionNotAllowed(host.id)));
    assert!(matches!(
        host.drain().as_slice(),
        [ServerEvent::Error { code, .. }] if code == "ACTION_NOT_ALLOWED"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_game_ends_it_for_the_survivor() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let room_id = started_game(&engine, &mut host, &mut guest, None).await;
    host.drain();

    engine.disconnect(guest.id).unwrap();
    let room = engine.room_snapshot(&room_id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::Finished);
    assert_eq!(room.players.len(), 1);

    let events = host.drain();
    assert!(matches!(events[0], ServerEvent::PlayerLeft { player_id, .. } if player_id == guest.id));
    assert!(matches!(events.last(), Some(ServerEvent::GameEnded { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_continue_and_replay() {
    let engine = engine();
    let mut host = Client::connect(&engine, 1);
    let mut guest = Client::connect(&engine, 2);
    let short = RoomConfigPatch {
        time_limit: Some(1),
        ..Default::default()
    };
    let room_id = started_game(&engine, &mut host, &mut guest, Some(short)).await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    engine
        .dispatch(host.id, None, ClientEvent::ContinueGame { room_id: room_id.clone() })
        .await
        .unwrap();
    let room = engine.room_snapshot(&room_id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.players.iter().all(|p| p.health == 1));

    engine
        .dispatch(host.id, None, ClientEvent::StartGame { room_id: room_id.clone() })
        .await
        .unwrap();
    let room = engine.room_snapshot(&room_id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::InProgress);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_shutdown_stops_engine() {
    let engine = engine();
    engine.shutdown().unwrap();
    let result = engine.room_snapshot(&RoomId::from("x")).await;
    assert_eq!(result, Err(RoomError::Unavailable));
    assert!(engine.is_closed());
}
