use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex SHA-256 of a token. This is the only form in which tokens reach the
/// session store.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct RealTokenService {
    codec: Arc<dyn TokenCodec>,
    session_store: Arc<dyn AuthSessionStore>,
    user_repo: Arc<dyn UserRepo>,
    clock: Arc<dyn Clock>,
    access_tracking: AccessTracking,
}

impl RealTokenService {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn AuthSessionStore>,
        user_repo: Arc<dyn UserRepo>,
        clock: Arc<dyn Clock>,
        access_tracking: AccessTracking,
    ) -> Self {
        Self {
            codec,
            session_store,
            user_repo,
            clock,
            access_tracking,
        }
    }

    fn mint_pair(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        let access = self.codec.encode(TokenKind::Access, user_id, role, now)?;
        let refresh = self.codec.encode(TokenKind::Refresh, user_id, role, now)?;
        Ok(AuthTokens {
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    fn tracked(&self) -> bool {
        self.access_tracking == AccessTracking::Tracked
    }

    async fn track_access(
        &self,
        user_id: UserId,
        tokens: &AuthTokens,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if !self.tracked() {
            return Ok(());
        }
        self.session_store
            .save_access(
                &fingerprint(&tokens.access_token.0),
                user_id,
                tokens.access_token_expires_at,
                now,
            )
            .await
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue_token_pair(
        &self,
        user_id: UserId,
        role: Role,
    ) -> Result<AuthTokens, AuthError> {
        let now = self.clock.now();
        let tokens = self.mint_pair(user_id, role, now)?;

        self.track_access(user_id, &tokens, now).await?;
        self.session_store
            .add_refresh(
                user_id,
                &fingerprint(&tokens.refresh_token.0),
                tokens.refresh_token_expires_at,
                now,
            )
            .await?;

        debug!(%user_id, %role, "issued token pair");
        Ok(tokens)
    }

    async fn verify_access(&self, token: &AccessToken) -> Result<Option<TokenClaims>, AuthError> {
        let now = self.clock.now();
        let claims = match self.codec.decode(TokenKind::Access, &token.0, now) {
            Ok(claims) => claims,
            Err(rejection) => {
                debug!(%rejection, "access token rejected");
                return Ok(None);
            }
        };

        if self.tracked()
            && !self
                .session_store
                .is_access_active(&fingerprint(&token.0), now)
                .await?
        {
            debug!(user_id = %claims.user_id, "access token no longer tracked");
            return Ok(None);
        }

        Ok(Some(claims))
    }

    async fn rotate_refresh(&self, token: &RefreshToken) -> Result<Option<AuthTokens>, AuthError> {
        let now = self.clock.now();
        let claims = match self.codec.decode(TokenKind::Refresh, &token.0, now) {
            Ok(claims) => claims,
            Err(rejection) => {
                debug!(%rejection, "refresh token rejected");
                return Ok(None);
            }
        };
        let user_id = claims.user_id;
        let old = fingerprint(&token.0);

        if !self
            .session_store
            .is_refresh_active(user_id, &old, now)
            .await?
        {
            debug!(%user_id, "refresh token not in session set");
            return Ok(None);
        }

        // never carry the role forward from the old claims
        let Some(role) = self.user_repo.find_role_by_id(user_id).await? else {
            debug!(%user_id, "refresh token owner no longer exists");
            return Ok(None);
        };

        let tokens = self.mint_pair(user_id, role, now)?;
        self.track_access(user_id, &tokens, now).await?;

        let swapped = self
            .session_store
            .rotate_refresh(
                user_id,
                &old,
                &fingerprint(&tokens.refresh_token.0),
                tokens.refresh_token_expires_at,
                now,
            )
            .await?;

        if !swapped {
            if self.tracked() {
                self.session_store
                    .remove_access(&fingerprint(&tokens.access_token.0))
                    .await?;
            }
            debug!(%user_id, "refresh token consumed concurrently");
            return Ok(None);
        }

        debug!(%user_id, %role, "rotated refresh token");
        Ok(Some(tokens))
    }

    async fn revoke(&self, user_id: UserId, token: &RefreshToken) -> Result<(), AuthError> {
        self.session_store
            .remove_refresh(user_id, &fingerprint(&token.0))
            .await?;
        debug!(%user_id, "revoked refresh token");
        Ok(())
    }

    async fn revoke_access(&self, token: &AccessToken) -> Result<(), AuthError> {
        if !self.tracked() {
            return Ok(());
        }
        self.session_store
            .remove_access(&fingerprint(&token.0))
            .await
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<(), AuthError> {
        self.session_store.remove_all_refresh(user_id).await?;
        info!(%user_id, "revoked all sessions");
        Ok(())
    }

    async fn active_sessions(&self, user_id: UserId) -> Result<usize, AuthError> {
        self.session_store
            .count_refresh(user_id, self.clock.now())
            .await
    }
}
