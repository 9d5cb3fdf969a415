//! Room, player, and question data model.
//!
//! These structures are both the engine's in-memory state and the
//! snapshots clients receive in `room_updated` and friends. Field names
//! are camelCase on the wire to match the browser client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomId};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How hard generated equations are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// The next-easier difficulty, or `None` for [`Difficulty::Easy`].
    pub fn easier(self) -> Option<Difficulty> {
        match self {
            Difficulty::Hard => Some(Difficulty::Medium),
            Difficulty::Medium => Some(Difficulty::Easy),
            Difficulty::Easy => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Lifecycle state of a room.
///
/// ```text
/// Waiting → InProgress → Finished
///    ↑                      │
///    └──── continue ────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Lobby: players may join, the host may change settings.
    #[default]
    Waiting,
    /// A game is running and the room clock is ticking.
    InProgress,
    /// The game ended; the leaderboard has been published.
    Finished,
}

impl RoomStatus {
    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: RoomStatus) -> bool {
        matches!(
            (self, target),
            (RoomStatus::Waiting, RoomStatus::InProgress)
                | (RoomStatus::InProgress, RoomStatus::Finished)
                | (RoomStatus::Finished, RoomStatus::Waiting)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "Waiting"),
            RoomStatus::InProgress => write!(f, "InProgress"),
            RoomStatus::Finished => write!(f, "Finished"),
        }
    }
}

/// What a player spends a correct answer on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Attack,
    Heal,
}

// ---------------------------------------------------------------------------
// Equations
// ---------------------------------------------------------------------------

/// A non-numeric equation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "=")]
    Equals,
    /// A withheld operand the player must supply.
    #[serde(rename = "?")]
    Blank,
}

impl Symbol {
    /// Returns `true` for the four arithmetic operators.
    pub fn is_operator(self) -> bool {
        matches!(self, Symbol::Add | Symbol::Sub | Symbol::Mul | Symbol::Div)
    }

    /// Returns `true` for `×` and `÷`.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, Symbol::Mul | Symbol::Div)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Symbol::Add => "+",
            Symbol::Sub => "-",
            Symbol::Mul => "*",
            Symbol::Div => "/",
            Symbol::Equals => "=",
            Symbol::Blank => "?",
        };
        f.write_str(s)
    }
}

/// One token of an equation: a number or a symbol.
///
/// Untagged, so `[3, "+", "?", "=", 7]` is the JSON form of `3 + ? = 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Number(i64),
    Symbol(Symbol),
}

impl Token {
    pub const BLANK: Token = Token::Symbol(Symbol::Blank);
    pub const EQUALS: Token = Token::Symbol(Symbol::Equals);

    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Symbol(Symbol::Blank))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Symbol(s) => write!(f, "{s}"),
        }
    }
}

/// A fill-in-the-blank equation handed to one player.
///
/// The withheld operand values never leave the server: they are skipped
/// by serde and only reachable through [`Question::withheld`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(alias = "equation_arr")]
    pub equation: Vec<Token>,
    pub difficulty: Difficulty,
    #[serde(skip)]
    withheld: Vec<i64>,
}

impl Question {
    pub fn new(
        id: String,
        equation: Vec<Token>,
        difficulty: Difficulty,
        withheld: Vec<i64>,
    ) -> Self {
        Self {
            id,
            equation,
            difficulty,
            withheld,
        }
    }

    /// The values removed from the equation, in left-to-right order.
    pub fn withheld(&self) -> &[i64] {
        &self.withheld
    }

    /// Number of [`Symbol::Blank`] tokens in the equation.
    pub fn blank_count(&self) -> usize {
        self.equation.iter().filter(|t| t.is_blank()).count()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.equation.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Room configuration
// ---------------------------------------------------------------------------

/// Per-room game settings chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    /// Seconds of health each player starts with.
    pub time_limit: u32,
    #[serde(alias = "questionDifficulty")]
    pub difficulty: Difficulty,
    pub max_players: usize,
    pub attack_damage: u32,
    pub heal_amount: u32,
    pub wrong_answer_penalty: u32,
    /// Public rooms are eligible for quick join.
    pub is_public: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            time_limit: 60,
            difficulty: Difficulty::Medium,
            max_players: 4,
            attack_damage: 5,
            heal_amount: 3,
            wrong_answer_penalty: 3,
            is_public: false,
        }
    }
}

impl RoomConfig {
    /// Returns a copy of `self` with every field set in `patch` replaced.
    pub fn merged(&self, patch: &RoomConfigPatch) -> RoomConfig {
        RoomConfig {
            time_limit: patch.time_limit.unwrap_or(self.time_limit),
            difficulty: patch.difficulty.unwrap_or(self.difficulty),
            max_players: patch.max_players.unwrap_or(self.max_players),
            attack_damage: patch.attack_damage.unwrap_or(self.attack_damage),
            heal_amount: patch.heal_amount.unwrap_or(self.heal_amount),
            wrong_answer_penalty: patch
                .wrong_answer_penalty
                .unwrap_or(self.wrong_answer_penalty),
            is_public: patch.is_public.unwrap_or(self.is_public),
        }
    }
}

/// A partial [`RoomConfig`]. Missing fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    #[serde(alias = "questionDifficulty", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_damage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal_amount: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrong_answer_penalty: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

// ---------------------------------------------------------------------------
// Players and rooms
// ---------------------------------------------------------------------------

/// A player seated in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    /// Numeric id from the identity provider, if one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub health: u32,
    pub score: u32,
    pub current_question_index: u32,
    pub is_host: bool,
    /// The outstanding question. Private to its player, so it is left out
    /// of room snapshots.
    #[serde(skip)]
    pub current_question: Option<Question>,
    pub can_perform_action: bool,
    /// Milliseconds since the Unix epoch when health reached zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elimination_time: Option<u64>,
    /// Orders eliminations that share a millisecond: players knocked out
    /// by the same tick or attack share a value, later events get larger
    /// ones.
    #[serde(skip)]
    pub elimination_seq: Option<u64>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        username: String,
        user_id: Option<u64>,
        health: u32,
        is_host: bool,
    ) -> Self {
        Self {
            id,
            username,
            user_id,
            health,
            score: 0,
            current_question_index: 0,
            is_host,
            current_question: None,
            can_perform_action: false,
            elimination_time: None,
            elimination_seq: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Puts the player back at the starting line for a new game.
    pub fn reset_for_game(&mut self, health: u32) {
        self.health = health;
        self.score = 0;
        self.current_question_index = 0;
        self.current_question = None;
        self.can_perform_action = false;
        self.elimination_time = None;
        self.elimination_seq = None;
    }

    /// Records that health reached zero.
    pub fn eliminate(&mut self, at_ms: u64, seq: u64) {
        self.health = 0;
        self.can_perform_action = false;
        self.current_question = None;
        if self.elimination_time.is_none() {
            self.elimination_time = Some(at_ms);
            self.elimination_seq = Some(seq);
        }
    }
}

/// A game room and everyone in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host_id: PlayerId,
    /// In join order.
    pub players: Vec<Player>,
    pub config: RoomConfig,
    pub status: RoomStatus,
}

impl Room {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    /// Seats still free under `max_players`.
    pub fn open_slots(&self) -> usize {
        self.config.max_players.saturating_sub(self.players.len())
    }
}

// ---------------------------------------------------------------------------
// Event payload records
// ---------------------------------------------------------------------------

/// One row of the end-of-game leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub username: String,
    pub score: u32,
    /// 1 is best.
    pub rank: u32,
}

/// A player's health after a tick, penalty, attack, or heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthUpdate {
    pub player_id: PlayerId,
    pub new_health: u32,
}

/// A resolved attack or heal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub source_player_id: PlayerId,
    pub target_player_id: PlayerId,
    pub value: u32,
}
