use crate::domain_model::{AuthTokens, Role, UserId};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("token invalid or expired")]
    InvalidOrExpired,
    #[error("forbidden")]
    Forbidden,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub role: Role,
    pub tokens: AuthTokens,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<RegisteredUser, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    /// Rotates the refresh token. Every rejection surfaces as `InvalidOrExpired`.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    /// Revokes exactly the given refresh token of the user owning `access_token`.
    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError>;
    /// Forced logout of every session of `user_id`.
    async fn revoke_sessions(&self, user_id: UserId) -> Result<(), AuthError>;
}
