use crate::application_port::AccessTracking;
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub cookie: Cookie,
    pub http: Http,
    pub log: Log,
    pub postgres: Postgres,
    pub redis: Redis,
    pub store: Store,
}

#[derive(Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    #[serde(default)]
    pub access_tracking: AccessTracking,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("access_tracking", &self.access_tracking)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Deserialize)]
pub struct Postgres {
    pub dsn: String,
    pub max_connections: u32,
}

impl fmt::Debug for Postgres {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Postgres")
            .field("dsn", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Deserialize)]
pub struct Redis {
    pub dsn: String,
    pub refresh_prefix: String,
    pub access_prefix: String,
}

impl fmt::Debug for Redis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redis")
            .field("dsn", &"<redacted>")
            .field("refresh_prefix", &self.refresh_prefix)
            .field("access_prefix", &self.access_prefix)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub credentials: String, // "postgres" or "memory"
    pub sessions: String,    // "redis" or "memory"
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `CATALOG_<SECTION>__<KEY>` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
