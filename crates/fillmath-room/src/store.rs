//! Room store: every room, who sits where, and each room's clock.

use std::collections::HashMap;

use fillmath_clock::{ClockEpoch, RoomClock};
use fillmath_identity::Identity;
use fillmath_protocol::{Player, PlayerId, Room, RoomConfig, RoomConfigPatch, RoomId, RoomStatus};
use fillmath_quiz::random_token;
use rand::Rng;

use crate::RoomError;
use crate::config::validate_config;

/// Length of generated room ids.
const ROOM_ID_LEN: usize = 7;

/// Name given to rooms created with a blank name.
const DEFAULT_ROOM_NAME: &str = "Fillmath room";

/// What happened when a player left their room.
#[derive(Debug, Clone)]
pub struct Departure {
    pub room_id: RoomId,
    /// The player as they were when they left.
    pub player: Player,
    /// `true` if the room was emptied and removed.
    pub room_removed: bool,
    /// Set when the host left and the seat passed to someone else.
    pub new_host: Option<PlayerId>,
}

struct StoredRoom {
    room: Room,
    /// Creation order. Quick join breaks ties by it.
    seq: u64,
}

/// Owns all rooms and keeps the player → room index consistent with them.
///
/// A player is in at most one room. Every mutation validates first and only
/// then touches state, so a refused request leaves the store unchanged.
#[derive(Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, StoredRoom>,
    player_rooms: HashMap<PlayerId, RoomId>,
    clocks: HashMap<RoomId, RoomClock>,
    next_seq: u64,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id).map(|r| &r.room)
    }

    pub fn room_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id).map(|r| &mut r.room)
    }

    /// The room `player_id` is currently seated in.
    pub fn room_of(&self, player_id: PlayerId) -> Option<&RoomId> {
        self.player_rooms.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Creates a room with `host` as its only player.
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        host: PlayerId,
        identity: &Identity,
        name: &str,
        patch: Option<&RoomConfigPatch>,
    ) -> Result<&Room, RoomError> {
        if let Some(current) = self.player_rooms.get(&host) {
            return Err(RoomError::AlreadyInRoom(host, current.clone()));
        }
        let config = match patch {
            Some(patch) => RoomConfig::default().merged(patch),
            None => RoomConfig::default(),
        };
        validate_config(&config, 1)?;

        let room_id = loop {
            let candidate = RoomId(random_token(rng, ROOM_ID_LEN));
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let name = match name.trim() {
            "" => DEFAULT_ROOM_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };
        let player = Player::new(
            host,
            identity.display_name.clone(),
            identity.user_id,
            config.time_limit,
            true,
        );
        let room = Room {
            id: room_id.clone(),
            name,
            host_id: host,
            players: vec![player],
            config,
            status: RoomStatus::Waiting,
        };

        self.next_seq += 1;
        self.player_rooms.insert(host, room_id.clone());
        tracing::info!(%room_id, %host, "room created");
        let stored = self
            .rooms
            .entry(room_id)
            .or_insert(StoredRoom { room, seq: self.next_seq });
        Ok(&stored.room)
    }

    /// Seats `player_id` in a waiting room with a free seat.
    pub fn join_room(
        &mut self,
        player_id: PlayerId,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<&Room, RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
        }
        let stored = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        let room = &mut stored.room;
        if room.status != RoomStatus::Waiting {
            return Err(RoomError::GameInProgress(room_id.clone()));
        }
        if room.open_slots() == 0 {
            return Err(RoomError::RoomFull(room_id.clone()));
        }

        room.players.push(Player::new(
            player_id,
            identity.display_name.clone(),
            identity.user_id,
            room.config.time_limit,
            false,
        ));
        self.player_rooms.insert(player_id, room_id.clone());
        tracing::info!(
            %room_id,
            %player_id,
            players = room.players.len(),
            "player joined"
        );
        Ok(room)
    }

    /// Picks the public waiting room closest to full and seats the player
    /// there. `Ok(None)` when no room qualifies.
    pub fn quick_join(
        &mut self,
        player_id: PlayerId,
        identity: &Identity,
    ) -> Result<Option<&Room>, RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
        }
        let best = self
            .rooms
            .values()
            .filter(|s| {
                s.room.config.is_public
                    && s.room.status == RoomStatus::Waiting
                    && s.room.open_slots() > 0
            })
            .min_by_key(|s| (s.room.open_slots(), s.seq))
            .map(|s| s.room.id.clone());

        match best {
            Some(room_id) => self.join_room(player_id, identity, &room_id).map(Some),
            None => {
                tracing::debug!(%player_id, "quick join found no open room");
                Ok(None)
            }
        }
    }

    /// Removes `player_id` from their room. Returns `None` if they were not
    /// seated anywhere.
    ///
    /// An emptied room is removed along with its clock. If the host left, the
    /// earliest remaining joiner becomes host.
    pub fn leave_room(&mut self, player_id: PlayerId) -> Option<Departure> {
        let room_id = self.player_rooms.remove(&player_id)?;
        let Some(stored) = self.rooms.get_mut(&room_id) else {
            tracing::warn!(%room_id, %player_id, "player index pointed at a missing room");
            return None;
        };
        let room = &mut stored.room;
        let index = room.players.iter().position(|p| p.id == player_id)?;
        let player = room.players.remove(index);

        if room.players.is_empty() {
            self.remove_room(&room_id);
            tracing::info!(%room_id, %player_id, "last player left, room removed");
            return Some(Departure {
                room_id,
                player,
                room_removed: true,
                new_host: None,
            });
        }

        let mut new_host = None;
        if room.host_id == player_id {
            let successor = &mut room.players[0];
            successor.is_host = true;
            room.host_id = successor.id;
            new_host = Some(successor.id);
            tracing::info!(%room_id, host = %successor.id, "host passed on");
        }
        tracing::info!(
            %room_id,
            %player_id,
            players = room.players.len(),
            "player left"
        );
        Some(Departure {
            room_id,
            player,
            room_removed: false,
            new_host,
        })
    }

    /// Host-only: removes the room and unseats everyone in it.
    pub fn delete_room(&mut self, requester: PlayerId, room_id: &RoomId) -> Result<Room, RoomError> {
        let room = self
            .room(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        if room.host_id != requester {
            return Err(RoomError::NotHost(requester, room_id.clone()));
        }
        let room = self
            .remove_room(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        tracing::info!(%room_id, host = %requester, "room deleted");
        Ok(room)
    }

    /// Host-only, lobby-only: applies a partial config.
    pub fn update_settings(
        &mut self,
        requester: PlayerId,
        room_id: &RoomId,
        patch: &RoomConfigPatch,
    ) -> Result<&Room, RoomError> {
        let room = self
            .room_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        if room.host_id != requester {
            return Err(RoomError::NotHost(requester, room_id.clone()));
        }
        match room.status {
            RoomStatus::Waiting => {}
            RoomStatus::InProgress => return Err(RoomError::GameInProgress(room_id.clone())),
            RoomStatus::Finished => {
                return Err(RoomError::InvalidState(
                    "settings can only change in the lobby".into(),
                ));
            }
        }
        let config = room.config.merged(patch);
        validate_config(&config, room.players.len())?;

        // Lobby health mirrors the time limit so snapshots show what each
        // player will start with.
        for player in &mut room.players {
            player.health = config.time_limit;
        }
        room.config = config;
        tracing::debug!(%room_id, "room settings updated");
        Ok(room)
    }

    // -- Clock slot --

    /// Stores the clock for a room, dropping (and so stopping) any previous
    /// one.
    pub fn attach_clock(&mut self, room_id: &RoomId, clock: RoomClock) {
        if let Some(old) = self.clocks.insert(room_id.clone(), clock) {
            tracing::warn!(%room_id, epoch = %old.epoch(), "replaced a running room clock");
        }
    }

    pub fn detach_clock(&mut self, room_id: &RoomId) -> Option<RoomClock> {
        self.clocks.remove(room_id)
    }

    /// Epoch of the room's running clock, if it has one.
    pub fn clock_epoch(&self, room_id: &RoomId) -> Option<ClockEpoch> {
        self.clocks.get(room_id).map(RoomClock::epoch)
    }

    fn remove_room(&mut self, room_id: &RoomId) -> Option<Room> {
        if let Some(clock) = self.clocks.remove(room_id) {
            clock.cancel();
        }
        let stored = self.rooms.remove(room_id)?;
        for player in &stored.room.players {
            self.player_rooms.remove(&player.id);
        }
        Some(stored.room)
    }
}
