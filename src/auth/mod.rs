use async_trait::async_trait;
use uuid::Uuid;

pub mod bearer;
pub mod jwt;
pub mod supabase;

pub use bearer::authenticate;

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The provider looked at the token and refused it.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The provider could not be asked.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a bearer token to the user it belongs to.
///
/// `Ok(None)` means the provider accepted the call but returned no user.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthUser>, IdentityError>;
}
