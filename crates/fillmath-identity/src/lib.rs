//! Identity provider boundary for Fillmath.
//!
//! Fillmath doesn't manage accounts. When a player creates or joins a room
//! the gateway asks an [`IdentityProvider`] who they are: a display name and,
//! for registered users, a numeric user id. Everything else about accounts
//! (credentials, storage, cookies) lives behind that trait.
//!
//! [`GuestIdentity`] is the default provider: it accepts the name the client
//! asked for after trimming and length checks.

mod error;
mod provider;

pub use error::IdentityError;
pub use provider::{GuestIdentity, Identity, IdentityProvider};
