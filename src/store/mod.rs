//! Persistence boundary for user records.
//!
//! Every operation hits the backing store; nothing is cached. A missing or
//! soft-deleted row is reported as [`StoreError::NotFound`], a duplicate live
//! email as [`StoreError::Conflict`], anything else as
//! [`StoreError::Unavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type UserId = i64;

/// A stored user. Holds the password hash, so it never crosses a transport
/// boundary; handlers convert it into a [`crate::users::UserView`] first.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub age: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("age", &self.age)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields for a record that does not exist yet; the store assigns the id.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub age: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("email already in use")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new record and return it with its assigned id.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// All live records ordered by id.
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Overwrite the full state of the record keyed by `user.id`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    /// Soft delete. A second call for the same id reports `NotFound`.
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}
