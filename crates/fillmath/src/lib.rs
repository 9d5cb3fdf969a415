//! # Fillmath
//!
//! Real-time multiplayer arithmetic battle server.
//!
//! Players gather in rooms, solve fill-in-the-blank equations, and spend
//! correct answers on attacks or heals while a room clock drains everyone's
//! health. The last player standing wins.
//!
//! This crate is the gateway: it accepts WebSocket connections, applies
//! per-connection checks (decoding, rate limiting, identity, single-flight
//! answers), and hands events to the session engine in `fillmath-room`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fillmath::prelude::*;
//!
//! # async fn run() -> Result<(), FillmathError> {
//! let server = FillmathServer::<GuestIdentity>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod flight;
mod handler;
mod rate_limit;
mod server;

pub use config::{RateLimitConfig, ServerConfig, ADDR_ENV, DEFAULT_ADDR};
pub use error::FillmathError;
pub use flight::{FlightGuard, SingleFlight};
pub use rate_limit::RateLimiter;
pub use server::{FillmathServer, FillmathServerBuilder};

pub mod prelude {
    pub use crate::{FillmathError, FillmathServer, FillmathServerBuilder, RateLimitConfig, ServerConfig};
    pub use fillmath_identity::{GuestIdentity, Identity, IdentityError, IdentityProvider};
    pub use fillmath_protocol::{ClientEvent, Envelope, PlayerId, RoomId, ServerEvent};
    pub use fillmath_room::{EngineConfig, EngineHandle, RoomError};
}
