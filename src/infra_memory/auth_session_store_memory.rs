use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

/// Process-local session store for development and tests.
///
/// A user's session set is mutated only while holding its DashMap shard lock,
/// which makes each operation atomic per user.
#[derive(Debug, Default)]
pub struct MemoryAuthSessionStore {
    refresh: DashMap<UserId, HashMap<String, DateTime<Utc>>>,
    access: DashMap<String, (UserId, DateTime<Utc>)>,
}

impl MemoryAuthSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prune(set: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) {
    set.retain(|_, expires_at| *expires_at > now);
}

#[async_trait::async_trait]
impl AuthSessionStore for MemoryAuthSessionStore {
    async fn add_refresh(
        &self,
        user_id: UserId,
        fingerprint: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut set = self.refresh.entry(user_id).or_default();
        prune(&mut set, now);
        set.insert(fingerprint.to_string(), expires_at);
        Ok(())
    }

    async fn is_refresh_active(
        &self,
        user_id: UserId,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let active = self
            .refresh
            .get(&user_id)
            .and_then(|set| set.get(fingerprint).map(|expires_at| *expires_at > now))
            .unwrap_or(false);
        Ok(active)
    }

    async fn rotate_refresh(
        &self,
        user_id: UserId,
        old: &str,
        new: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let Some(mut set) = self.refresh.get_mut(&user_id) else {
            return Ok(false);
        };
        if !set.get(old).is_some_and(|expires_at| *expires_at > now) {
            return Ok(false);
        }
        set.remove(old);
        prune(&mut set, now);
        set.insert(new.to_string(), new_expires_at);
        Ok(true)
    }

    async fn remove_refresh(&self, user_id: UserId, fingerprint: &str) -> Result<(), AuthError> {
        if let Some(mut set) = self.refresh.get_mut(&user_id) {
            set.remove(fingerprint);
        }
        self.refresh.remove_if(&user_id, |_, set| set.is_empty());
        Ok(())
    }

    async fn remove_all_refresh(&self, user_id: UserId) -> Result<(), AuthError> {
        self.refresh.remove(&user_id);
        Ok(())
    }

    async fn count_refresh(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<usize, AuthError> {
        let count = self
            .refresh
            .get(&user_id)
            .map(|set| set.values().filter(|expires_at| **expires_at > now).count())
            .unwrap_or(0);
        Ok(count)
    }

    async fn save_access(
        &self,
        fingerprint: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.access.retain(|_, (_, expires_at)| *expires_at > now);
        self.access
            .insert(fingerprint.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn is_access_active(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let active = self
            .access
            .get(fingerprint)
            .map(|entry| entry.1 > now)
            .unwrap_or(false);
        Ok(active)
    }

    async fn remove_access(&self, fingerprint: &str) -> Result<(), AuthError> {
        self.access.remove(fingerprint);
        Ok(())
    }
}
