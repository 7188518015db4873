use super::AuthError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Why a token failed to decode. Only ever logged, never returned to callers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
    #[error("unknown role claim")]
    UnknownRole,
}

#[derive(Debug, Clone)]
pub struct EncodedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and checks tokens. Expiry is evaluated against `now` so callers
/// control the clock.
pub trait TokenCodec: Send + Sync {
    fn encode(
        &self,
        kind: TokenKind,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<EncodedToken, AuthError>;

    fn decode(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenRejection>;
}

/// Whether access tokens are also looked up in the session store.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTracking {
    /// Signature and expiry only. Revocation waits for natural expiry.
    #[default]
    Stateless,
    /// Each access token also needs a live `token:<fingerprint>` entry.
    Tracked,
}

/// Mints, verifies, rotates and revokes token pairs.
///
/// Expected auth failures come back as `None`; `Err` only carries
/// infrastructure failures.
#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    async fn issue_token_pair(&self, user_id: UserId, role: Role)
    -> Result<AuthTokens, AuthError>;

    async fn verify_access(&self, token: &AccessToken) -> Result<Option<TokenClaims>, AuthError>;

    async fn rotate_refresh(&self, token: &RefreshToken) -> Result<Option<AuthTokens>, AuthError>;

    /// Idempotent: removing an absent token succeeds.
    async fn revoke(&self, user_id: UserId, token: &RefreshToken) -> Result<(), AuthError>;

    /// Drops the access entry in tracked mode; no-op when stateless.
    async fn revoke_access(&self, token: &AccessToken) -> Result<(), AuthError>;

    async fn revoke_all(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn active_sessions(&self, user_id: UserId) -> Result<usize, AuthError>;
}
