//! Rooms and game sessions for Fillmath.
//!
//! All room state lives in one engine actor (a Tokio task) that processes
//! player events, clock ticks, and deferred questions strictly one at a
//! time.
//!
//! # Key types
//!
//! - [`spawn_engine`] / [`EngineHandle`]: start the engine and talk to it
//! - [`RoomStore`]: the room registry and player → room index
//! - [`compute_leaderboard`]: end-of-game ranking
//! - [`EngineConfig`]: clock period, action delay, scoring
//! - [`RoomError`]: every refusal, with its wire code

mod config;
mod controller;
mod engine;
mod error;
mod leaderboard;
mod store;

pub use config::{validate_config, EngineConfig, MIN_PLAYERS};
pub use engine::{spawn_engine, EngineHandle, OutboundSender, PendingReply};
pub use error::RoomError;
pub use leaderboard::compute_leaderboard;
pub use store::{Departure, RoomStore};
