//! Identity types and message routing for Fillmath.
//!
//! Player and room ids travel on the wire inside every room snapshot and
//! most events, so they are newtypes with transparent serde representations.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// Assigned from the transport's connection id when a socket is accepted,
/// so it is unique for the lifetime of the process. `#[serde(transparent)]`
/// keeps it a plain number on the wire: `PlayerId(42)` becomes `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Rooms are addressed by a short lowercase alphanumeric token (for
/// example `"k3x9a0q"`) that players share with each other to join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// The session controller returns `(Recipient, ServerEvent)` pairs and the
/// engine resolves room-scoped recipients against room membership at
/// delivery time, after the command's mutations have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every player currently in the room.
    Room(RoomId),

    /// Every player in the room except one (usually the actor).
    RoomExcept(RoomId, PlayerId),

    /// One specific player.
    Player(PlayerId),

    /// An explicit list of players. Used when the room itself is gone.
    Players(Vec<PlayerId>),
}
