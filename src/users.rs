//! User CRUD orchestration, shared by both transports.
//!
//! Nothing here deals with credentials: administratively created users have
//! no password hash and cannot log in until they register.

use crate::{
    store::{CredentialStore, NewUser, User, UserId},
    Error, Result,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The client-facing subset of a user record. Never carries password material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub age: i32,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
        }
    }
}

/// Validated fields shared by administrative creation and registration.
#[derive(Debug)]
pub(crate) struct Profile {
    pub name: String,
    pub email: String,
    pub age: i32,
}

impl Profile {
    pub(crate) fn parse(name: &str, email: &str, age: i32) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name is required"));
        }

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::validation("email is required"));
        }
        if !valid_email(&email) {
            return Err(Error::validation("email is invalid"));
        }

        if age < 1 {
            return Err(Error::validation("age must be greater than 0"));
        }

        Ok(Self {
            name: name.to_string(),
            email,
            age,
        })
    }
}

/// A partial update. Empty strings and non-positive ages count as "not
/// supplied", so a field can be left alone but never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
}

impl UserChanges {
    /// Apply the supplied fields to `user`, returning whether anything changed.
    fn apply(self, user: &mut User) -> Result<bool> {
        let mut changed = false;

        if let Some(name) = self.name.map(|name| name.trim().to_string()) {
            if !name.is_empty() && name != user.name {
                user.name = name;
                changed = true;
            }
        }

        if let Some(email) = self.email.map(|email| normalize_email(&email)) {
            if !email.is_empty() {
                if !valid_email(&email) {
                    return Err(Error::validation("email is invalid"));
                }
                if email != user.email {
                    user.email = email;
                    changed = true;
                }
            }
        }

        if let Some(age) = self.age.filter(|age| *age > 0) {
            if age != user.age {
                user.age = age;
                changed = true;
            }
        }

        Ok(changed)
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn CredentialStore>,
}

impl UserService {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Create a user without credentials.
    ///
    /// # Errors
    /// `Validation` for bad input, `Conflict` if the email is taken.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, email: &str, age: i32) -> Result<UserView> {
        let profile = Profile::parse(name, email, age)?;

        let user = self
            .store
            .create(NewUser {
                name: profile.name,
                email: profile.email,
                password_hash: None,
                age: profile.age,
            })
            .await?;

        info!(user.id = user.id, "user created");

        Ok(user.into())
    }

    /// # Errors
    /// `Internal` if the store fails.
    pub async fn list_all(&self) -> Result<Vec<UserView>> {
        let users = self.store.find_all().await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// # Errors
    /// `NotFound` if no live user has this id.
    pub async fn get_by_id(&self, id: UserId) -> Result<UserView> {
        Ok(self.store.find_by_id(id).await?.into())
    }

    /// Overwrite only the supplied fields of user `id`.
    ///
    /// # Errors
    /// `NotFound` if the user does not exist, `Validation` for a malformed
    /// email, `Conflict` if the new email belongs to someone else.
    #[instrument(skip(self))]
    pub async fn update(&self, id: UserId, changes: UserChanges) -> Result<UserView> {
        let mut user = self.store.find_by_id(id).await?;

        if !changes.apply(&mut user)? {
            debug!(user.id = id, "update carried no changes");
            return Ok(user.into());
        }

        let user = self.store.update(&user).await?;

        info!(user.id = id, "user updated");

        Ok(user.into())
    }

    /// # Errors
    /// `NotFound` if the user does not exist or was already deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> Result<()> {
        self.store.delete(id).await?;

        info!(user.id = id, "user deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.example.org"));
        assert!(!valid_email("alice"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("al ice@example.com"));
        assert!(!valid_email(""));
    }

    #[tokio::test]
    async fn alice_lifecycle() {
        let users = service();

        let created = users.create("Alice", "alice@example.com", 25).await.unwrap();
        assert_ne!(created.id, 0);
        assert_eq!(created.name, "Alice");
        assert_eq!(created.age, 25);

        let fetched = users.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = users
            .update(
                created.id,
                UserChanges {
                    name: Some("Alice2".to_string()),
                    age: Some(30),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alice2");
        assert_eq!(updated.age, 30);
        assert_eq!(updated.email, "alice@example.com");

        users.delete(created.id).await.unwrap();
        assert!(matches!(
            users.get_by_id(created.id).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(users.delete(created.id).await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let users = service();
        let created = users.create("Bob", "bob@example.com", 40).await.unwrap();

        let renamed = users
            .update(
                created.id,
                UserChanges {
                    name: Some("X".to_string()),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.email, created.email);
        assert_eq!(renamed.age, created.age);

        let untouched = users
            .update(created.id, UserChanges::default())
            .await
            .unwrap();
        assert_eq!(untouched, renamed);

        let blanks = users
            .update(
                created.id,
                UserChanges {
                    name: Some(String::new()),
                    email: Some("  ".to_string()),
                    age: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(blanks, renamed);
    }

    #[tokio::test]
    async fn update_validates_email_and_uniqueness() {
        let users = service();
        let alice = users.create("Alice", "alice@example.com", 25).await.unwrap();
        users.create("Bob", "bob@example.com", 40).await.unwrap();

        let invalid = users
            .update(
                alice.id,
                UserChanges {
                    email: Some("not-an-email".to_string()),
                    ..UserChanges::default()
                },
            )
            .await;
        assert!(matches!(invalid, Err(Error::Validation(_))));

        let taken = users
            .update(
                alice.id,
                UserChanges {
                    email: Some("BOB@example.com".to_string()),
                    ..UserChanges::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(Error::Conflict)));

        let missing = users.update(9999, UserChanges::default()).await;
        assert!(matches!(missing, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn create_validates_input() {
        let users = service();

        for (name, email, age) in [
            ("", "alice@example.com", 25),
            ("Alice", "", 25),
            ("Alice", "alice", 25),
            ("Alice", "alice@example.com", 0),
            ("Alice", "alice@example.com", -3),
        ] {
            assert!(matches!(
                users.create(name, email, age).await,
                Err(Error::Validation(_))
            ));
        }
        assert!(users.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_normalizes_email_and_rejects_duplicates() {
        let users = service();
        let created = users
            .create("Alice", "  Alice@Example.COM ", 25)
            .await
            .unwrap();
        assert_eq!(created.email, "alice@example.com");

        assert!(matches!(
            users.create("Alice", "alice@example.com", 25).await,
            Err(Error::Conflict)
        ));
        assert_eq!(users.list_all().await.unwrap().len(), 1);
    }
}
