use async_trait::async_trait;

use crate::error::RemoteError;

/// An in-progress authorisation: the URL the user must visit and the
/// verifier that proves the later code exchange came from us.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub url: String,
    pub verifier: String,
}

#[async_trait]
pub trait DriveAuth: Send + Sync {
    /// Build an authorisation URL for the user to visit
    fn begin(&self) -> Result<AuthChallenge, RemoteError>;

    /// Exchange the user's reply (a bare code or the full redirect URL) for
    /// credentials and bring the session up
    async fn complete(&self, challenge: &AuthChallenge, reply: &str) -> Result<(), RemoteError>;
}
