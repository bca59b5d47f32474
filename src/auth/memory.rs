use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    auth::{
        password::Credential,
        repo::{TokenStore, UserStore},
        repo_types::User,
        tokens::{hash_token, AuthToken, Scope},
    },
    error::StoreError,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<[u8; 32], AuthToken>,
}

/// Copy of `user` as it would be persisted: hash only, no plaintext.
fn stored(user: &User) -> User {
    let mut row = user.clone();
    row.credential = Credential::from_hash(user.credential.hash());
    row
}

impl Tables {
    fn email_taken(&self, email: &str, except: i64) -> bool {
        self.users
            .values()
            .any(|u| u.id != except && u.email == email)
    }
}

/// Process-local user and token tables with the same semantics as the Postgres
/// stores: unique emails, versioned updates and token cascade on delete.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    #[cfg(test)]
    pub fn token_count(&self, scope: Scope, user_id: i64) -> usize {
        self.tables()
            .tokens
            .values()
            .filter(|t| t.scope == scope && t.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables.email_taken(&user.email, 0) {
            return Err(StoreError::DuplicateEmail);
        }
        tables.next_id += 1;
        let now = OffsetDateTime::now_utc();
        user.id = tables.next_id;
        user.created_at = now;
        user.updated_at = now;
        user.version = 1;
        tables.users.insert(user.id, stored(user));
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.tables()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables().users.values().cloned().collect())
    }

    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.tables();
        match tables.users.get(&user.id) {
            Some(stored) if stored.version == user.version => {}
            _ => return Err(StoreError::EditConflict),
        }
        if tables.email_taken(&user.email, user.id) {
            return Err(StoreError::DuplicateEmail);
        }
        user.version += 1;
        user.updated_at = OffsetDateTime::now_utc();
        tables.users.insert(user.id, stored(user));
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }

    async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        let hash = hash_token(plaintext);
        let now = OffsetDateTime::now_utc();
        let tables = self.tables();
        tables
            .tokens
            .get(&hash)
            .filter(|t| t.scope == scope && !t.is_expired_at(now))
            .and_then(|t| tables.users.get(&t.user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &AuthToken) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&token.user_id) {
            return Err(StoreError::Corrupt(anyhow::anyhow!(
                "token owner {} does not exist",
                token.user_id
            )));
        }
        let now = OffsetDateTime::now_utc();
        tables.tokens.retain(|_, t| !t.is_expired_at(now));
        tables.tokens.insert(token.hash, token.clone());
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.tables()
            .tokens
            .retain(|_, t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}
