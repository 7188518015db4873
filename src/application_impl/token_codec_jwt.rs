use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    role: String,
    typ: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.cfg.access_secret,
            TokenKind::Refresh => &self.cfg.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        // exp is compared against the caller's clock in `decode`
        v.validate_exp = false;
        v.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);
        v.set_audience(&[self.cfg.audience.as_str()]);
        v.set_issuer(&[self.cfg.issuer.as_str()]);
        v
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenRejection> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenRejection::Malformed)
}

impl TokenCodec for JwtHs256Codec {
    fn encode(
        &self,
        kind: TokenKind,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<EncodedToken, AuthError> {
        let iat = now.timestamp();
        let exp = now
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| AuthError::InternalError("token expiry out of range".to_string()))?
            .timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            typ: kind.as_str().to_string(),
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError(format!("expiry out of range: {exp}")))?;

        Ok(EncodedToken { token, expires_at })
    }

    fn decode(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenRejection> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &self.validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenRejection::BadSignature,
            _ => TokenRejection::Malformed,
        })?;
        let claims = data.claims;

        if claims.typ != kind.as_str() {
            return Err(TokenRejection::WrongKind);
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenRejection::Expired);
        }

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenRejection::Malformed)?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| TokenRejection::UnknownRole)?;

        Ok(TokenClaims {
            user_id,
            role,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }
}
