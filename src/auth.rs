//! Registration and login.
//!
//! Passwords are hashed with Argon2id (PHC string format) on the blocking
//! pool. Login failures never reveal whether the email exists.

use crate::{
    store::{CredentialStore, NewUser, StoreError},
    token::TokenCodec,
    users::{normalize_email, Profile, UserView},
    Error, Result,
};
use anyhow::anyhow;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

pub const MIN_PASSWORD_LEN: usize = 6;

/// A freshly issued token together with the user it was issued for.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AuthSession {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub age: i32,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Create a user with credentials and sign them in.
    async fn register(&self, registration: Registration) -> Result<AuthSession>;

    /// Exchange an email and password for a token.
    async fn login(&self, email: &str, password: &SecretString) -> Result<AuthSession>;
}

pub struct PasswordAuthenticator {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenCodec>,
}

impl PasswordAuthenticator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenCodec>) -> Self {
        Self { store, tokens }
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    #[instrument(skip_all)]
    async fn register(&self, registration: Registration) -> Result<AuthSession> {
        let profile = Profile::parse(&registration.name, &registration.email, registration.age)?;

        if registration.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        match self.store.find_by_email(&profile.email).await {
            Ok(_) => return Err(Error::Conflict),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let password_hash = hash_password(registration.password).await?;

        // The store re-checks uniqueness, so a concurrent registration for
        // the same email still ends in Conflict here.
        let user = self
            .store
            .create(NewUser {
                name: profile.name,
                email: profile.email,
                password_hash: Some(password_hash),
                age: profile.age,
            })
            .await?;

        let token = match self.tokens.issue(user.id, &user.email) {
            Ok(token) => token,
            Err(err) => {
                error!("failed to issue token for new user {}: {err}", user.id);
                if let Err(cleanup) = self.store.delete(user.id).await {
                    error!("failed to roll back user {}: {cleanup}", user.id);
                }
                return Err(err.into());
            }
        };

        info!(user.id = user.id, "user registered");

        Ok(AuthSession {
            token,
            user: user.into(),
        })
    }

    #[instrument(skip_all)]
    async fn login(&self, email: &str, password: &SecretString) -> Result<AuthSession> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::validation("email is required"));
        }
        if password.expose_secret().is_empty() {
            return Err(Error::validation("password is required"));
        }

        let user = match self.store.find_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!("login failed: unknown email");
                return Err(Error::InvalidCredentials);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(stored_hash) = user.password_hash.clone() else {
            warn!(user.id = user.id, "login failed: user has no credentials");
            return Err(Error::InvalidCredentials);
        };

        if !verify_password(password.clone(), stored_hash).await? {
            warn!(user.id = user.id, "login failed: password mismatch");
            return Err(Error::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id, &user.email)?;

        info!(user.id = user.id, "user logged in");

        Ok(AuthSession {
            token,
            user: user.into(),
        })
    }
}

async fn hash_password(password: SecretString) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    })
    .await
    .map_err(Error::internal)?
    .map_err(Error::internal)
}

async fn verify_password(password: SecretString, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored_hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.expose_secret().as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(Error::internal)?
    .map_err(Error::internal)
}
