use super::{CredentialStore, NewUser, StoreError, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

/// In-process store with the same contract as [`super::SqliteStore`]:
/// increasing ids, soft deletes and live-email uniqueness.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: UserId,
    rows: BTreeMap<UserId, Row>,
}

#[derive(Debug)]
struct Row {
    user: User,
    deleted_at: Option<DateTime<Utc>>,
}

impl Row {
    const fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl Inner {
    fn live(&self) -> impl Iterator<Item = &User> {
        self.rows.values().filter(|row| row.is_live()).map(|row| &row.user)
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.live()
            .any(|user| user.email == email && Some(user.id) != except)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.email_taken(&user.email, None) {
            return Err(StoreError::Conflict);
        }

        inner.last_id += 1;
        let now = Utc::now();
        let stored = User {
            id: inner.last_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            age: user.age,
            created_at: now,
            updated_at: now,
        };

        inner.rows.insert(
            stored.id,
            Row {
                user: stored.clone(),
                deleted_at: None,
            },
        );

        Ok(stored)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.live().cloned().collect())
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .rows
            .get(&id)
            .filter(|row| row.is_live())
            .map(|row| row.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let found = inner.live().find(|user| user.email == email).cloned();
        found.ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if !inner.rows.get(&user.id).is_some_and(Row::is_live) {
            return Err(StoreError::NotFound);
        }
        if inner.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict);
        }

        let row = inner.rows.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        row.user = User {
            id: row.user.id,
            created_at: row.user.created_at,
            updated_at: Utc::now(),
            ..user.clone()
        };

        Ok(row.user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        match inner.rows.get_mut(&id) {
            Some(row) if row.is_live() => {
                let now = Utc::now();
                row.deleted_at = Some(now);
                row.user.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}
