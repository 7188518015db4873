use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Fetch credentials by username (for login).
    async fn find_by_username(&self, username: &str)
    -> Result<Option<UserCredentials>, AuthError>;

    /// Current role of a user, `None` once the user is gone.
    async fn find_role_by_id(&self, user_id: UserId) -> Result<Option<Role>, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;

    /// Fails with `AuthError::UserExists` when the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, AuthError>;
}
