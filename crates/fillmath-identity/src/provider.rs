//! The [`IdentityProvider`] trait and the guest implementation.

use fillmath_protocol::PlayerId;

use crate::IdentityError;

/// Who a player is, as far as a room is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Name shown to other players.
    pub display_name: String,
    /// Account id for registered users, `None` for guests.
    pub user_id: Option<u64>,
}

/// Resolves a connection's identity when it creates or joins a room.
///
/// `Send + Sync + 'static` because one provider is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use fillmath_identity::{Identity, IdentityError, IdentityProvider};
/// use fillmath_protocol::PlayerId;
///
/// /// Gives everyone the same account. Only useful in tests.
/// struct Everyone;
///
/// impl IdentityProvider for Everyone {
///     async fn resolve(
///         &self,
///         _player_id: PlayerId,
///         requested_name: &str,
///     ) -> Result<Identity, IdentityError> {
///         Ok(Identity { display_name: requested_name.to_string(), user_id: Some(1) })
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the identity for `player_id`, given the display name the
    /// client asked for.
    fn resolve(
        &self,
        player_id: PlayerId,
        requested_name: &str,
    ) -> impl std::future::Future<Output = Result<Identity, IdentityError>> + Send;
}

/// Accepts any reasonable display name without an account.
#[derive(Debug, Clone)]
pub struct GuestIdentity {
    max_name_len: usize,
}

impl GuestIdentity {
    pub const DEFAULT_MAX_NAME_LEN: usize = 32;

    pub fn new() -> Self {
        Self {
            max_name_len: Self::DEFAULT_MAX_NAME_LEN,
        }
    }

    /// Sets the longest accepted name, counted in characters.
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    fn validate(&self, requested_name: &str) -> Result<String, IdentityError> {
        let name = requested_name.trim();
        if name.is_empty() {
            return Err(IdentityError::InvalidName("name is empty".into()));
        }
        let len = name.chars().count();
        if len > self.max_name_len {
            return Err(IdentityError::InvalidName(format!(
                "name is {len} characters, at most {} allowed",
                self.max_name_len
            )));
        }
        Ok(name.to_string())
    }
}

impl Default for GuestIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for GuestIdentity {
    async fn resolve(
        &self,
        player_id: PlayerId,
        requested_name: &str,
    ) -> Result<Identity, IdentityError> {
        let display_name = self.validate(requested_name)?;
        tracing::debug!(%player_id, %display_name, "guest identity resolved");
        Ok(Identity {
            display_name,
            user_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guest_trims_name() {
        let id = GuestIdentity::new()
            .resolve(PlayerId(1), "  ada  ")
            .await
            .unwrap();
        assert_eq!(id.display_name, "ada");
        assert_eq!(id.user_id, None);
    }

    #[tokio::test]
    async fn test_guest_rejects_blank_name() {
        let err = GuestIdentity::new()
            .resolve(PlayerId(1), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidName(_)));
        assert_eq!(err.code(), "INVALID_NAME");
    }

    #[tokio::test]
    async fn test_guest_rejects_long_name() {
        let provider = GuestIdentity::new().max_name_len(4);
        assert!(provider.resolve(PlayerId(1), "abcd").await.is_ok());
        assert!(provider.resolve(PlayerId(1), "abcde").await.is_err());
    }

    #[tokio::test]
    async fn test_guest_counts_characters_not_bytes() {
        let provider = GuestIdentity::new().max_name_len(3);
        assert!(provider.resolve(PlayerId(1), "äöü").await.is_ok());
    }
}
