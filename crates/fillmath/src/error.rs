//! Unified error type for the Fillmath server.

use fillmath_identity::IdentityError;
use fillmath_protocol::ProtocolError;
use fillmath_room::RoomError;
use fillmath_transport::TransportError;

/// Top-level error that wraps every crate's error.
///
/// The `#[from]` attributes let `?` convert layer errors as they bubble up
/// through the gateway.
#[derive(Debug, thiserror::Error)]
pub enum FillmathError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode or decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The identity provider refused a player.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The engine refused a request or is gone.
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: FillmathError = err.into();
        assert!(matches!(err, FillmathError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: FillmathError = ProtocolError::Decode(json_err).into();
        assert!(matches!(err, FillmathError::Protocol(ProtocolError::Decode(_))));
        assert!(err.to_string().starts_with("decode failed"));
    }

    #[test]
    fn test_from_identity_error() {
        let err: FillmathError = IdentityError::InvalidName("empty".into()).into();
        assert!(matches!(err, FillmathError::Identity(_)));
    }

    #[test]
    fn test_from_room_error_keeps_message() {
        let err: FillmathError = RoomError::Unavailable.into();
        assert!(matches!(err, FillmathError::Room(RoomError::Unavailable)));
        assert_eq!(err.to_string(), RoomError::Unavailable.to_string());
    }
}
