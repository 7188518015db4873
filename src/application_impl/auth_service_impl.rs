use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;
use tokio::sync::OnceCell;

const DECOY_PASSWORD: &str = "catalog-auth-decoy-password";

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
    min_username_len: usize,
    min_password_len: usize,
    decoy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_service,
            min_username_len: 3,
            min_password_len: 6,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Spends the same hashing work as a real password check, so an unknown
    /// username costs as much as a wrong password.
    async fn verify_against_decoy(&self, password: &str) -> Result<(), AuthError> {
        let decoy_hash = self
            .decoy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DECOY_PASSWORD))
            .await?;
        self.credential_hasher
            .verify_password(password, decoy_hash)
            .await?;
        Ok(())
    }

    fn validate_registration(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.trim() != username {
            return Err(AuthError::InvalidInput(
                "username has surrounding whitespace".to_string(),
            ));
        }
        if username.chars().count() < self.min_username_len {
            return Err(AuthError::InvalidInput("username too short".to_string()));
        }
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::InvalidInput("password too short".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<RegisteredUser, AuthError> {
        let RegisterInput { username, password } = request;

        self.validate_registration(&username, &password)?;

        if self.user_repo.username_exists(&username).await? {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = self
            .user_repo
            .create_user(&username, &password_hash, Role::User)
            .await?;

        info!(%user_id, %username, "registered user");
        Ok(RegisteredUser { user_id, username })
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        let Some(rec) = self.user_repo.find_by_username(&username).await? else {
            self.verify_against_decoy(&password).await?;
            debug!(%username, "unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            debug!(user_id = %rec.user_id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self
            .token_service
            .issue_token_pair(rec.user_id, rec.role)
            .await?;

        info!(user_id = %rec.user_id, "user logged in");
        Ok(LoginResult {
            user_id: rec.user_id,
            role: rec.role,
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        self.token_service
            .rotate_refresh(&RefreshToken(refresh_token.to_string()))
            .await?
            .ok_or(AuthError::InvalidOrExpired)
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let access_token = AccessToken(access_token.to_string());
        let claims = self
            .token_service
            .verify_access(&access_token)
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;

        self.token_service
            .revoke(claims.user_id, &RefreshToken(refresh_token.to_string()))
            .await?;
        self.token_service.revoke_access(&access_token).await?;

        info!(user_id = %claims.user_id, "user logged out");
        Ok(())
    }

    async fn revoke_sessions(&self, user_id: UserId) -> Result<(), AuthError> {
        self.token_service.revoke_all(user_id).await
    }
}
