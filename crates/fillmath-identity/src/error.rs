//! Error types for identity resolution.

/// Errors an [`IdentityProvider`](crate::IdentityProvider) can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The requested display name is empty or too long.
    #[error("invalid display name: {0}")]
    InvalidName(String),

    /// The provider refused the player (banned, unknown account, etc.).
    #[error("identity rejected: {0}")]
    Rejected(String),
}

impl IdentityError {
    /// Machine-readable code sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::InvalidName(_) => "INVALID_NAME",
            IdentityError::Rejected(_) => "IDENTITY_REJECTED",
        }
    }
}
