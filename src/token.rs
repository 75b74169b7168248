//! Bearer token issuance and verification.
//!
//! Tokens are compact JWS strings signed with HS256 under the configured
//! secret. Verification accepts HS256 only, so a token whose header names any
//! other algorithm is rejected even if it was signed with the same secret.

use crate::store::UserId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Decoded token payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    /// Issued at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expires at, seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("JWT signing secret is not configured")]
    MissingSecret,

    #[error("token lifetime out of range: {0} hours")]
    InvalidLifetime(i64),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec for `secret` issuing tokens valid for `lifetime_hours`.
    ///
    /// # Errors
    /// `MissingSecret` for an empty secret, `InvalidLifetime` for a non-positive lifetime.
    pub fn new(secret: &SecretString, lifetime_hours: i64) -> Result<Self, TokenError> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let lifetime = Duration::try_hours(lifetime_hours)
            .filter(|_| lifetime_hours > 0)
            .ok_or(TokenError::InvalidLifetime(lifetime_hours))?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        })
    }

    /// Issue a token for `user_id` / `email`, valid from now.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the claims cannot be signed.
    pub fn issue(&self, user_id: UserId, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, email, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the claims cannot be signed.
    pub fn issue_at(
        &self,
        user_id: UserId,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or(TokenError::InvalidLifetime(self.lifetime.num_hours()))?;

        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Check the signature and expiry of `token` and return its claims.
    ///
    /// # Errors
    /// `Expired` when the signature is valid but the token is past `exp`,
    /// `Invalid` for anything else.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                kind => {
                    debug!("token rejected: {kind:?}");
                    TokenError::Invalid
                }
            })
    }
}
