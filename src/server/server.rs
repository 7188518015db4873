use crate::api::v1::RefreshCookie;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_postgres::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use chrono::Duration;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

fn ttl(setting: &str, secs: u64) -> anyhow::Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| anyhow!("{} out of range: {}", setting, secs))
}

/// Everything the HTTP layer needs, built once at startup.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub auth_gate: Arc<AuthGate>,
    pub refresh_cookie: Arc<RefreshCookie>,
    pool: Option<PgPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let auth = &settings.auth;
        if auth.access_secret.is_empty() || auth.refresh_secret.is_empty() {
            return Err(anyhow!("auth.access_secret and auth.refresh_secret must be set"));
        }
        if auth.access_secret == auth.refresh_secret {
            warn!("access and refresh tokens share a signing secret");
        }

        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.store.credentials.as_str() {
            "postgres" => {
                let pg = PgPoolOptions::new()
                    .max_connections(settings.postgres.max_connections)
                    .connect(&settings.postgres.dsn)
                    .await?;
                pool = Some(pg.clone());
                Arc::new(PgUserRepo::new(pg))
            }
            "memory" => Arc::new(MemoryUserRepo::new()),
            other => return Err(anyhow!("Unknown credentials store: {}", other)),
        };

        let session_store: Arc<dyn AuthSessionStore> = match settings.store.sessions.as_str() {
            "redis" => {
                let redis_client = redis::Client::open(settings.redis.dsn.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisAuthSessionStore::new(
                    redis_manager,
                    settings.redis.refresh_prefix.clone(),
                    settings.redis.access_prefix.clone(),
                ))
            }
            "memory" => Arc::new(MemoryAuthSessionStore::new()),
            other => return Err(anyhow!("Unknown session store: {}", other)),
        };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            access_ttl: ttl("auth.access_ttl_secs", auth.access_ttl_secs)?,
            refresh_ttl: ttl("auth.refresh_ttl_secs", auth.refresh_ttl_secs)?,
            access_secret: auth.access_secret.clone().into_bytes(),
            refresh_secret: auth.refresh_secret.clone().into_bytes(),
        }));

        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            token_codec,
            session_store,
            user_repo.clone(),
            Arc::new(SystemClock),
            auth.access_tracking,
        ));

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_service.clone(),
        ));

        let refresh_cookie = RefreshCookie {
            name: settings.cookie.name.clone(),
            path: settings.cookie.path.clone(),
            secure: settings.cookie.secure,
            max_age_secs: auth.refresh_ttl_secs,
        };

        info!(
            credentials = %settings.store.credentials,
            sessions = %settings.store.sessions,
            access_tracking = ?auth.access_tracking,
            "server started"
        );

        let mut server = Self::from_services(auth_service, token_service, refresh_cookie);
        server.pool = pool;
        Ok(server)
    }

    pub fn from_services(
        auth_service: Arc<dyn AuthService>,
        token_service: Arc<dyn TokenService>,
        refresh_cookie: RefreshCookie,
    ) -> Self {
        Self {
            auth_service,
            auth_gate: Arc::new(AuthGate::new(token_service)),
            refresh_cookie: Arc::new(refresh_cookie),
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
