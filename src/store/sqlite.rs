use super::{CredentialStore, NewUser, StoreError, User, UserId};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Sqlite,
};
use std::str::FromStr;
use tracing::{debug, instrument, Instrument, info_span};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, name, email, password_hash, age, created_at, updated_at";

/// SQLite-backed store. Rows are soft-deleted through `deleted_at`.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path` and apply the schema.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the file cannot be opened or the schema fails.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StoreError::Unavailable)?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// A private in-memory database. The pool is pinned to one connection that
    /// never expires, since every SQLite `:memory:` connection is its own database.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the schema cannot be applied.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(StoreError::Unavailable)?;

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StoreError::Unavailable)?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Create the `users` table and its indexes if they are missing.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(info_span!("db.migrate", db.system = "sqlite"))
            .await
            .map_err(StoreError::Unavailable)?;

        debug!("users schema is up to date");

        Ok(())
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        _ => StoreError::Unavailable(err),
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    #[instrument(skip_all, fields(db.system = "sqlite", db.operation = "INSERT"))]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO users (name, email, password_hash, age, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<Sqlite, User>(&query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.age)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    #[instrument(skip_all, fields(db.system = "sqlite", db.operation = "SELECT"))]
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id");

        sqlx::query_as::<Sqlite, User>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Unavailable)
    }

    #[instrument(skip(self), fields(db.system = "sqlite", db.operation = "SELECT"))]
    async fn find_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");

        sqlx::query_as::<Sqlite, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Unavailable)?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip_all, fields(db.system = "sqlite", db.operation = "SELECT"))]
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? AND deleted_at IS NULL");

        sqlx::query_as::<Sqlite, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Unavailable)?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip_all, fields(db.system = "sqlite", db.operation = "UPDATE", user.id = user.id))]
    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users
             SET name = ?, email = ?, password_hash = ?, age = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<Sqlite, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.age)
            .bind(Utc::now())
            .bind(user.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), fields(db.system = "sqlite", db.operation = "UPDATE"))]
    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str, age: i32) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: None,
            age,
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = SqliteStore::in_memory().await.unwrap();

        let alice = store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();
        let bob = store
            .create(new_user("Bob", "bob@example.com", 31))
            .await
            .unwrap();

        assert!(alice.id > 0);
        assert!(bob.id > alice.id);
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.age, 25);
    }

    #[tokio::test]
    async fn duplicate_live_email_is_a_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();

        let err = store
            .create(new_user("Other", "alice@example.com", 40))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_by_email_and_id() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();

        let by_email = store.find_by_email("alice@example.com").await.unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap();

        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "alice@example.com");
        assert!(matches!(
            store.find_by_email("nobody@example.com").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.find_by_id(created.id + 100).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_overwrites_state() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut user = store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();

        user.name = "Alice2".to_string();
        user.age = 30;
        let updated = store.update(&user).await.unwrap();

        assert_eq!(updated.name, "Alice2");
        assert_eq!(updated.age, 30);
        assert_eq!(updated.email, "alice@example.com");
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut user = store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();
        user.id += 1;

        assert!(matches!(
            store.update(&user).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_into_taken_email_is_a_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();
        let mut bob = store
            .create(new_user("Bob", "bob@example.com", 31))
            .await
            .unwrap();

        bob.email = "alice@example.com".to_string();

        assert!(matches!(store.update(&bob).await, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn soft_delete_hides_row_and_frees_email() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store
            .create(new_user("Alice", "alice@example.com", 25))
            .await
            .unwrap();

        store.delete(user.id).await.unwrap();

        assert!(matches!(
            store.find_by_id(user.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete(user.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.find_all().await.unwrap().is_empty());

        let again = store
            .create(new_user("Alice", "alice@example.com", 26))
            .await
            .unwrap();
        assert_ne!(again.id, user.id);
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
    }
}
