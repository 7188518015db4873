use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Server-side token state. Tokens are passed as fingerprints, never raw.
///
/// Each refresh entry lives in its user's session set and expires on its own at
/// `expires_at`. Every mutating call must be atomic per user key.
#[async_trait::async_trait]
pub trait AuthSessionStore: Send + Sync {
    async fn add_refresh(
        &self,
        user_id: UserId,
        fingerprint: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    async fn is_refresh_active(
        &self,
        user_id: UserId,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Replace `old` with `new` if `old` is still an unexpired member.
    /// Returns false, and changes nothing, otherwise.
    async fn rotate_refresh(
        &self,
        user_id: UserId,
        old: &str,
        new: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    async fn remove_refresh(&self, user_id: UserId, fingerprint: &str) -> Result<(), AuthError>;

    async fn remove_all_refresh(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn count_refresh(&self, user_id: UserId, now: DateTime<Utc>)
    -> Result<usize, AuthError>;

    async fn save_access(
        &self,
        fingerprint: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    async fn is_access_active(&self, fingerprint: &str, now: DateTime<Utc>)
    -> Result<bool, AuthError>;

    async fn remove_access(&self, fingerprint: &str) -> Result<(), AuthError>;
}
