use crate::application_port::*;
use crate::domain_model::*;
use std::sync::Arc;

/// The single check every guarded route goes through.
pub struct AuthGate {
    token_service: Arc<dyn TokenService>,
}

impl AuthGate {
    pub fn new(token_service: Arc<dyn TokenService>) -> Self {
        AuthGate { token_service }
    }

    /// `authorization` is the raw header value, if any.
    pub async fn admit(
        &self,
        authorization: Option<&str>,
        required: Option<Role>,
    ) -> Result<TokenClaims, AuthError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .token_service
            .verify_access(&AccessToken(token.to_string()))
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;

        if let Some(required) = required {
            if !claims.role.satisfies(required) {
                return Err(AuthError::Forbidden);
            }
        }

        Ok(claims)
    }
}

/// Token part of `Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}
