//! Wire protocol for Fillmath.
//!
//! This crate defines the vocabulary clients and the server share:
//!
//! - **Ids** ([`PlayerId`], [`RoomId`]) and routing ([`Recipient`]).
//! - **Data model** ([`Room`], [`Player`], [`Question`], [`RoomConfig`], …):
//!   the engine's state, serialized as room snapshots.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): the
//!   messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent / Envelope) → Room engine
//! ```

mod codec;
mod error;
mod events;
mod model;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, Envelope, ServerEvent};
pub use model::{
    ActionRecord, ActionType, Difficulty, HealthUpdate, LeaderboardEntry,
    Player, Question, Room, RoomConfig, RoomConfigPatch, RoomStatus, Symbol,
    Token,
};
pub use types::{PlayerId, Recipient, RoomId};
