//! Session controller: the game rules.
//!
//! Every method takes the requesting player and returns the events to
//! deliver, addressed by [`Recipient`]. Nothing here does I/O; the engine
//! actor owns the controller, resolves recipients to connections, and
//! turns a returned [`RoomError`] into an error event for the requester.
//!
//! Validation always runs to completion before the first mutation, so an
//! error means the room is exactly as it was.

use std::ops::ControlFlow;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fillmath_clock::{ClockEpoch, RoomClock};
use fillmath_identity::Identity;
use fillmath_protocol::{
    ActionRecord, ActionType, ClientEvent, HealthUpdate, PlayerId, Recipient, Room,
    RoomConfigPatch, RoomId, RoomStatus, ServerEvent,
};
use fillmath_quiz::{generate_question, verify};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc::WeakUnboundedSender;
use tracing::{debug, error, info, trace};

use crate::config::{EngineConfig, MIN_PLAYERS};
use crate::engine::EngineCommand;
use crate::leaderboard::compute_leaderboard;
use crate::store::RoomStore;
use crate::RoomError;

/// Events produced by one command, in delivery order.
pub(crate) type Outbox = Vec<(Recipient, ServerEvent)>;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) struct SessionController {
    store: RoomStore,
    config: EngineConfig,
    rng: StdRng,
    /// Clock ticks and deferred questions come back through here. Weak, so
    /// the engine still stops once every handle is gone.
    loopback: WeakUnboundedSender<EngineCommand>,
    /// Bumped once per command that can eliminate someone.
    elimination_seq: u64,
}

impl SessionController {
    pub(crate) fn new(config: EngineConfig, loopback: WeakUnboundedSender<EngineCommand>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store: RoomStore::new(),
            config,
            rng,
            loopback,
            elimination_seq: 0,
        }
    }

    pub(crate) fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Routes one client event.
    ///
    /// `identity` is what the gateway resolved for joining events; without
    /// one the requested username is used as-is.
    pub(crate) fn handle(
        &mut self,
        player_id: PlayerId,
        identity: Option<Identity>,
        event: ClientEvent,
    ) -> Result<Outbox, RoomError> {
        match event {
            ClientEvent::CreateRoom {
                username,
                room_name,
                config,
            } => {
                let identity = identity.unwrap_or_else(|| guest(&username));
                self.create_room(player_id, &identity, &room_name, config.as_ref())
            }
            ClientEvent::JoinRoom { username, room_id } => {
                let identity = identity.unwrap_or_else(|| guest(&username));
                self.join_room(player_id, &identity, &room_id)
            }
            ClientEvent::QuickJoin { username } => {
                let identity = identity.unwrap_or_else(|| guest(&username));
                self.quick_join(player_id, &identity)
            }
            ClientEvent::LeaveRoom {} => self.leave_room(player_id),
            ClientEvent::UpdateSettings { room_id, config } => {
                self.update_settings(player_id, &room_id, &config)
            }
            ClientEvent::DeleteRoom { room_id } => self.delete_room(player_id, &room_id),
            ClientEvent::ContinueGame { room_id } => self.continue_game(player_id, &room_id),
            ClientEvent::StartGame { room_id } => self.start_game(player_id, &room_id),
            ClientEvent::GetQuestion { room_id } => self.get_question(player_id, &room_id),
            ClientEvent::SubmitAnswer {
                room_id,
                question_id,
                answer,
            } => self.submit_answer(player_id, &room_id, &question_id, &answer),
            ClientEvent::PerformAction {
                room_id,
                action_type,
                target_player_id,
            } => self.perform_action(player_id, &room_id, action_type, target_player_id),
        }
    }

    // =====================================================================
    // Lobby
    // =====================================================================

    pub(crate) fn create_room(
        &mut self,
        player_id: PlayerId,
        identity: &Identity,
        name: &str,
        patch: Option<&RoomConfigPatch>,
    ) -> Result<Outbox, RoomError> {
        let room = self
            .store
            .create_room(&mut self.rng, player_id, identity, name, patch)?;
        Ok(vec![
            (
                Recipient::Player(player_id),
                ServerEvent::RoomCreated { room: room.clone() },
            ),
            (
                Recipient::Room(room.id.clone()),
                ServerEvent::RoomUpdated { room: room.clone() },
            ),
        ])
    }

    pub(crate) fn join_room(
        &mut self,
        player_id: PlayerId,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<Outbox, RoomError> {
        let room = self.store.join_room(player_id, identity, room_id)?;
        Ok(joined(player_id, room))
    }

    pub(crate) fn quick_join(
        &mut self,
        player_id: PlayerId,
        identity: &Identity,
    ) -> Result<Outbox, RoomError> {
        match self.store.quick_join(player_id, identity)? {
            Some(room) => Ok(joined(player_id, room)),
            None => Ok(vec![(
                Recipient::Player(player_id),
                ServerEvent::NoRoomsAvailable {},
            )]),
        }
    }

    pub(crate) fn leave_room(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        let (room_id, mut out) = self
            .depart(player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;
        out.insert(
            0,
            (Recipient::Player(player_id), ServerEvent::RoomLeft { room_id }),
        );
        Ok(out)
    }

    /// A dropped connection. Same as leaving, minus the reply to a socket
    /// that is already gone.
    pub(crate) fn disconnect(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        Ok(self
            .depart(player_id)
            .map(|(_, out)| out)
            .unwrap_or_default())
    }

    fn depart(&mut self, player_id: PlayerId) -> Option<(RoomId, Outbox)> {
        let departure = self.store.leave_room(player_id)?;
        debug!(
            room_id = %departure.room_id,
            %player_id,
            username = %departure.player.username,
            score = departure.player.score,
            new_host = ?departure.new_host,
            "seat released"
        );
        let room_id = departure.room_id;
        let mut out = Vec::new();
        if !departure.room_removed {
            out.push((
                Recipient::Room(room_id.clone()),
                ServerEvent::PlayerLeft {
                    room_id: room_id.clone(),
                    player_id,
                },
            ));
            if let Some(room) = self.store.room(&room_id) {
                out.push((
                    Recipient::Room(room_id.clone()),
                    ServerEvent::RoomUpdated { room: room.clone() },
                ));
            }
            self.finish_if_decided(&room_id, &mut out);
        }
        Some((room_id, out))
    }

    pub(crate) fn update_settings(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
        patch: &RoomConfigPatch,
    ) -> Result<Outbox, RoomError> {
        let room = self.store.update_settings(player_id, room_id, patch)?;
        Ok(vec![(
            Recipient::Room(room_id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        )])
    }

    pub(crate) fn delete_room(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
    ) -> Result<Outbox, RoomError> {
        let room = self.store.delete_room(player_id, room_id)?;
        Ok(vec![(
            Recipient::Players(room.player_ids()),
            ServerEvent::RoomDeleted {
                room_id: room_id.clone(),
            },
        )])
    }

    /// Host-only: takes a finished room back to the lobby with fresh stats.
    pub(crate) fn continue_game(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
    ) -> Result<Outbox, RoomError> {
        let room = hosted_room(&mut self.store, player_id, room_id)?;
        advance(room, RoomStatus::Waiting)?;
        let health = room.config.time_limit;
        for player in &mut room.players {
            player.reset_for_game(health);
        }
        debug!(%room_id, "room back in the lobby");
        Ok(vec![(
            Recipient::Room(room_id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        )])
    }

    // =====================================================================
    // Game flow
    // =====================================================================

    pub(crate) fn start_game(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
    ) -> Result<Outbox, RoomError> {
        let room = hosted_room(&mut self.store, player_id, room_id)?;
        match room.status {
            RoomStatus::Waiting => {}
            RoomStatus::InProgress => return Err(RoomError::GameInProgress(room_id.clone())),
            RoomStatus::Finished => {
                return Err(RoomError::InvalidState(format!(
                    "room {room_id} must continue to the lobby before starting again"
                )));
            }
        }
        if room.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers {
                room_id: room_id.clone(),
                needed: MIN_PLAYERS,
            });
        }

        advance(room, RoomStatus::InProgress)?;
        let health = room.config.time_limit;
        let difficulty = room.config.difficulty;
        for player in &mut room.players {
            player.reset_for_game(health);
        }

        let mut out = vec![(
            Recipient::Room(room_id.clone()),
            ServerEvent::GameStarted { room: room.clone() },
        )];
        for player in &mut room.players {
            let question = generate_question(&mut self.rng, difficulty);
            player.current_question = Some(question.clone());
            out.push((
                Recipient::Player(player.id),
                ServerEvent::QuestionReceived { question },
            ));
        }
        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        ));
        info!(%room_id, players = room.players.len(), %difficulty, "game started");

        let clock = self.spawn_clock(room_id);
        self.store.attach_clock(room_id, clock);
        Ok(out)
    }

    /// Hands the player a fresh question, replacing any outstanding one.
    pub(crate) fn get_question(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
    ) -> Result<Outbox, RoomError> {
        let room = seated_room(&mut self.store, player_id, room_id)?;
        require_in_progress(room)?;
        let difficulty = room.config.difficulty;
        let player = living_player(room, player_id)?;

        let question = generate_question(&mut self.rng, difficulty);
        trace!(%room_id, %player_id, question_id = %question.id, "question issued");
        player.current_question = Some(question.clone());
        Ok(vec![(
            Recipient::Player(player_id),
            ServerEvent::QuestionReceived { question },
        )])
    }

    pub(crate) fn submit_answer(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
        question_id: &str,
        answer: &[i64],
    ) -> Result<Outbox, RoomError> {
        let seq = self.next_elimination_seq();
        let points = self.config.points_per_answer;
        let room = seated_room(&mut self.store, player_id, room_id)?;
        require_in_progress(room)?;
        let penalty = room.config.wrong_answer_penalty;
        let player = living_player(room, player_id)?;

        let question = player
            .current_question
            .as_ref()
            .ok_or(RoomError::NoActiveQuestion(player_id))?;
        if question.id != question_id {
            return Err(RoomError::StaleQuestion {
                question_id: question_id.to_string(),
            });
        }
        let correct = match verify(question, answer) {
            Ok(correct) => correct,
            Err(err) => {
                error!(%room_id, %player_id, %question, %err, "answer could not be evaluated");
                return Err(RoomError::Internal);
            }
        };
        player.current_question = None;

        let mut out = Vec::new();
        if correct {
            player.score = player.score.saturating_add(points);
            player.current_question_index += 1;
            player.can_perform_action = true;
            debug!(%room_id, %player_id, score = player.score, "correct answer");
            out.push((
                Recipient::Player(player_id),
                ServerEvent::AnswerResult {
                    correct: true,
                    can_perform_action: true,
                },
            ));
            out.push((
                Recipient::Room(room_id.clone()),
                ServerEvent::RoomUpdated { room: room.clone() },
            ));
            return Ok(out);
        }

        player.health = player.health.saturating_sub(penalty);
        let eliminated = !player.is_alive();
        if eliminated {
            player.eliminate(now_ms(), seq);
        }
        debug!(%room_id, %player_id, health = player.health, "wrong answer");
        out.push((
            Recipient::Player(player_id),
            ServerEvent::AnswerResult {
                correct: false,
                can_perform_action: player.can_perform_action,
            },
        ));
        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::HealthUpdated {
                updates: health_updates(room),
            },
        ));
        if eliminated {
            info!(%room_id, %player_id, "player eliminated by a wrong answer");
            out.push((
                Recipient::Room(room_id.clone()),
                ServerEvent::PlayerEliminated { player_id },
            ));
        }
        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        ));
        self.finish_if_decided(room_id, &mut out);
        Ok(out)
    }

    pub(crate) fn perform_action(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
        action_type: ActionType,
        target_player_id: Option<PlayerId>,
    ) -> Result<Outbox, RoomError> {
        let seq = self.next_elimination_seq();
        let room = seated_room(&mut self.store, player_id, room_id)?;
        require_in_progress(room)?;
        if !living_player(room, player_id)?.can_perform_action {
            return Err(RoomError::ActionNotAllowed(player_id));
        }

        let (target_id, value) = match action_type {
            ActionType::Attack => {
                let target = target_player_id
                    .filter(|t| *t != player_id)
                    .filter(|t| room.player(*t).is_some_and(|p| p.is_alive()))
                    .ok_or(RoomError::TargetNotFound)?;
                (target, room.config.attack_damage)
            }
            // Heals always land on the actor.
            ActionType::Heal => (player_id, room.config.heal_amount),
        };

        let target = room
            .player_mut(target_id)
            .ok_or(RoomError::TargetNotFound)?;
        let mut eliminated = false;
        match action_type {
            ActionType::Attack => {
                target.health = target.health.saturating_sub(value);
                if !target.is_alive() {
                    target.eliminate(now_ms(), seq);
                    eliminated = true;
                }
            }
            ActionType::Heal => target.health = target.health.saturating_add(value),
        }
        let new_health = target.health;
        if let Some(actor) = room.player_mut(player_id) {
            actor.can_perform_action = false;
        }
        debug!(%room_id, %player_id, target = %target_id, ?action_type, value, "action performed");

        let mut out = vec![
            (
                Recipient::Room(room_id.clone()),
                ServerEvent::ActionPerformed {
                    action: ActionRecord {
                        action_type,
                        source_player_id: player_id,
                        target_player_id: target_id,
                        value,
                    },
                },
            ),
            (
                Recipient::Room(room_id.clone()),
                ServerEvent::HealthUpdated {
                    updates: vec![HealthUpdate {
                        player_id: target_id,
                        new_health,
                    }],
                },
            ),
        ];
        if eliminated {
            info!(%room_id, player_id = %target_id, attacker = %player_id, "player eliminated by an attack");
            out.push((
                Recipient::Room(room_id.clone()),
                ServerEvent::PlayerEliminated {
                    player_id: target_id,
                },
            ));
        }
        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        ));

        if !self.finish_if_decided(room_id, &mut out) {
            if let Some(epoch) = self.store.clock_epoch(room_id) {
                self.schedule_question(room_id, player_id, epoch);
            }
        }
        Ok(out)
    }

    /// A deferred question coming due. It is dropped quietly if the game
    /// it was scheduled in is over, or if the player can no longer take it.
    pub(crate) fn issue_question(
        &mut self,
        room_id: &RoomId,
        player_id: PlayerId,
        epoch: ClockEpoch,
    ) -> Result<Outbox, RoomError> {
        if self.store.clock_epoch(room_id) != Some(epoch) {
            debug!(%room_id, %player_id, %epoch, "deferred question outlived its game");
            return Ok(Vec::new());
        }
        match self.get_question(player_id, room_id) {
            Ok(out) => Ok(out),
            Err(err) => {
                debug!(%room_id, %player_id, %err, "deferred question dropped");
                Ok(Vec::new())
            }
        }
    }

    /// One clock tick: every living player loses a point of health.
    pub(crate) fn tick(&mut self, room_id: &RoomId, epoch: ClockEpoch) -> Result<Outbox, RoomError> {
        if self.store.clock_epoch(room_id) != Some(epoch) {
            trace!(%room_id, %epoch, "ignoring tick from a stopped clock");
            return Ok(Vec::new());
        }
        let seq = self.next_elimination_seq();
        let Some(room) = self.store.room_mut(room_id) else {
            return Ok(Vec::new());
        };
        if room.status != RoomStatus::InProgress {
            return Ok(Vec::new());
        }

        let now = now_ms();
        let mut eliminated = Vec::new();
        for player in room.players.iter_mut().filter(|p| p.is_alive()) {
            player.health -= 1;
            if !player.is_alive() {
                player.eliminate(now, seq);
                eliminated.push(player.id);
            }
        }

        let mut out = vec![(
            Recipient::Room(room_id.clone()),
            ServerEvent::HealthUpdated {
                updates: health_updates(room),
            },
        )];
        for player_id in eliminated {
            info!(%room_id, %player_id, "player ran out of time");
            out.push((
                Recipient::Room(room_id.clone()),
                ServerEvent::PlayerEliminated { player_id },
            ));
        }
        self.finish_if_decided(room_id, &mut out);
        Ok(out)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Ends the game if at most one player is still alive. Returns `true`
    /// if it did.
    fn finish_if_decided(&mut self, room_id: &RoomId, out: &mut Outbox) -> bool {
        let Some(room) = self.store.room_mut(room_id) else {
            return false;
        };
        if room.alive_count() > 1 || advance(room, RoomStatus::Finished).is_err() {
            return false;
        }

        let (leaderboard, game_winner) = compute_leaderboard(&room.players);
        for player in &mut room.players {
            player.current_question = None;
            player.can_perform_action = false;
        }
        info!(
            %room_id,
            winner = ?game_winner.as_ref().map(|w| w.player_id),
            "game finished"
        );

        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::LeaderboardUpdated {
                leaderboard,
                game_winner,
            },
        ));
        out.push((
            Recipient::Room(room_id.clone()),
            ServerEvent::GameEnded {
                room_id: room_id.clone(),
            },
        ));
        if let Some(clock) = self.store.detach_clock(room_id) {
            clock.cancel();
        }
        true
    }

    fn spawn_clock(&self, room_id: &RoomId) -> RoomClock {
        let loopback = self.loopback.clone();
        let room_id = room_id.clone();
        RoomClock::spawn(self.config.clock.clone(), move |epoch, _info| {
            let Some(commands) = loopback.upgrade() else {
                return ControlFlow::Break(());
            };
            let tick = EngineCommand::Tick {
                room_id: room_id.clone(),
                epoch,
            };
            match commands.send(tick) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        })
    }

    /// Posts an `IssueQuestion` for `player_id` after the action delay.
    fn schedule_question(&self, room_id: &RoomId, player_id: PlayerId, epoch: ClockEpoch) {
        let loopback = self.loopback.clone();
        let room_id = room_id.clone();
        let delay: Duration = self.config.action_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = loopback.upgrade() {
                let _ = commands.send(EngineCommand::IssueQuestion {
                    room_id,
                    player_id,
                    epoch,
                });
            }
        });
    }

    fn next_elimination_seq(&mut self) -> u64 {
        self.elimination_seq += 1;
        self.elimination_seq
    }
}

fn guest(username: &str) -> Identity {
    Identity {
        display_name: username.trim().to_string(),
        user_id: None,
    }
}

fn joined(player_id: PlayerId, room: &Room) -> Outbox {
    let username = room
        .player(player_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    vec![
        (
            Recipient::Player(player_id),
            ServerEvent::RoomJoined { room: room.clone() },
        ),
        (
            Recipient::RoomExcept(room.id.clone(), player_id),
            ServerEvent::PlayerJoined {
                room_id: room.id.clone(),
                player_id,
                username,
            },
        ),
        (
            Recipient::Room(room.id.clone()),
            ServerEvent::RoomUpdated { room: room.clone() },
        ),
    ]
}

fn health_updates(room: &Room) -> Vec<HealthUpdate> {
    room.players
        .iter()
        .map(|p| HealthUpdate {
            player_id: p.id,
            new_health: p.health,
        })
        .collect()
}

fn seated_room<'a>(
    store: &'a mut RoomStore,
    player_id: PlayerId,
    room_id: &RoomId,
) -> Result<&'a mut Room, RoomError> {
    let room = store
        .room_mut(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
    if !room.contains(player_id) {
        return Err(RoomError::NotInRoom(player_id));
    }
    Ok(room)
}

fn hosted_room<'a>(
    store: &'a mut RoomStore,
    player_id: PlayerId,
    room_id: &RoomId,
) -> Result<&'a mut Room, RoomError> {
    let room = store
        .room_mut(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
    if room.host_id != player_id {
        return Err(RoomError::NotHost(player_id, room_id.clone()));
    }
    Ok(room)
}

fn require_in_progress(room: &Room) -> Result<(), RoomError> {
    if room.status == RoomStatus::InProgress {
        Ok(())
    } else {
        Err(RoomError::InvalidState(format!(
            "room {} has no game in progress",
            room.id
        )))
    }
}

/// Moves `room` to `target` if the lifecycle allows it.
fn advance(room: &mut Room, target: RoomStatus) -> Result<(), RoomError> {
    if !room.status.can_transition_to(target) {
        return Err(RoomError::InvalidState(format!(
            "room {} cannot go from {} to {target}",
            room.id, room.status
        )));
    }
    room.status = target;
    Ok(())
}

fn living_player(
    room: &mut Room,
    player_id: PlayerId,
) -> Result<&mut fillmath_protocol::Player, RoomError> {
    let player = room
        .player_mut(player_id)
        .ok_or(RoomError::NotInRoom(player_id))?;
    if !player.is_alive() {
        return Err(RoomError::PlayerEliminated(player_id));
    }
    Ok(player)
}
