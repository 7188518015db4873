use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, Script, ToRedisArgs,
    Value,
};

const ADD_REFRESH: &str = include_str!("add_refresh.lua");
const ROTATE_REFRESH: &str = include_str!("rotate_refresh.lua");

/// Session sets live at `<refresh_prefix>:<user_id>` as sorted sets whose
/// scores are member expiry times in milliseconds. Access entries live at
/// `<access_prefix>:<fingerprint>` with a native TTL.
pub struct RedisAuthSessionStore {
    conn: ConnectionManager,
    refresh_prefix: String,
    access_prefix: String,
    add_refresh: Script,
    rotate_refresh: Script,
}

impl RedisAuthSessionStore {
    pub fn new(
        conn: ConnectionManager,
        refresh_prefix: impl Into<String>,
        access_prefix: impl Into<String>,
    ) -> Self {
        RedisAuthSessionStore {
            conn,
            refresh_prefix: refresh_prefix.into(),
            access_prefix: access_prefix.into(),
            add_refresh: Script::new(ADD_REFRESH),
            rotate_refresh: Script::new(ROTATE_REFRESH),
        }
    }

    fn refresh_key(&self, user_id: UserId) -> String {
        format!("{}:{}", self.refresh_prefix, user_id)
    }

    fn access_key(&self, fingerprint: &str) -> String {
        format!("{}:{}", self.access_prefix, fingerprint)
    }
}

fn upstream(e: RedisError) -> AuthError {
    AuthError::UpstreamUnavailable(e.to_string())
}

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

impl FromRedisValue for UserId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let user_id = s.parse::<UserId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid UserId string",
                e.to_string(),
            ))
        })?;
        Ok(user_id)
    }
}

#[async_trait::async_trait]
impl AuthSessionStore for RedisAuthSessionStore {
    async fn add_refresh(
        &self,
        user_id: UserId,
        fingerprint: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .add_refresh
            .key(self.refresh_key(user_id))
            .arg(fingerprint)
            .arg(expires_at.timestamp_millis())
            .arg(now.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn is_refresh_active(
        &self,
        user_id: UserId,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn
            .zscore(self.refresh_key(user_id), fingerprint)
            .await
            .map_err(upstream)?;
        Ok(score.is_some_and(|expires_at| expires_at > now.timestamp_millis() as f64))
    }

    async fn rotate_refresh(
        &self,
        user_id: UserId,
        old: &str,
        new: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .rotate_refresh
            .key(self.refresh_key(user_id))
            .arg(old)
            .arg(new)
            .arg(new_expires_at.timestamp_millis())
            .arg(now.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(upstream)?;
        Ok(swapped == 1)
    }

    async fn remove_refresh(&self, user_id: UserId, fingerprint: &str) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrem(self.refresh_key(user_id), fingerprint)
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn remove_all_refresh(&self, user_id: UserId) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(self.refresh_key(user_id))
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn count_refresh(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<usize, AuthError> {
        let mut conn = self.conn.clone();
        let count: usize = conn
            .zcount(
                self.refresh_key(user_id),
                format!("({}", now.timestamp_millis()),
                "+inf",
            )
            .await
            .map_err(upstream)?;
        Ok(count)
    }

    async fn save_access(
        &self,
        fingerprint: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let ttl_ms = (expires_at - now).num_milliseconds();
        if ttl_ms <= 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(self.access_key(fingerprint), &user_id, ttl_ms as u64)
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn is_access_active(
        &self,
        fingerprint: &str,
        _now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let owner: Option<UserId> = conn
            .get(self.access_key(fingerprint))
            .await
            .map_err(upstream)?;
        Ok(owner.is_some())
    }

    async fn remove_access(&self, fingerprint: &str) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(self.access_key(fingerprint))
            .await
            .map_err(upstream)?;
        Ok(())
    }
}
