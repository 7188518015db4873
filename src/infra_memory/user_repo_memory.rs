use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicI64, Ordering};

/// Credential store kept in process memory, indexed by id and by username.
#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    next_id: AtomicI64,
    by_id: DashMap<UserId, UserCredentials>,
    ids_by_username: DashMap<String, UserId>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the stored role; returns false for unknown users.
    pub fn set_role(&self, user_id: UserId, role: Role) -> bool {
        match self.by_id.get_mut(&user_id) {
            Some(mut user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, user_id: UserId) -> bool {
        match self.by_id.remove(&user_id) {
            Some((_, user)) => {
                self.ids_by_username.remove(&user.username);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AuthError> {
        let Some(user_id) = self.ids_by_username.get(username).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&user_id).map(|user| user.value().clone()))
    }

    async fn find_role_by_id(&self, user_id: UserId) -> Result<Option<Role>, AuthError> {
        Ok(self.by_id.get(&user_id).map(|user| user.role))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.ids_by_username.contains_key(username))
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, AuthError> {
        // the username entry stays locked until the user row exists
        match self.ids_by_username.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                let user_id = UserId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                self.by_id.insert(
                    user_id,
                    UserCredentials {
                        user_id,
                        username: username.to_string(),
                        password_hash: password_hash.to_string(),
                        role,
                    },
                );
                slot.insert(user_id);
                Ok(user_id)
            }
        }
    }
}
