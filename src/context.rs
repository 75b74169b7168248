//! Authenticated request context.
//!
//! Flow Overview: the HTTP middleware or the gRPC layer verifies the bearer
//! token, builds a [`Principal`] from its claims and inserts it into the
//! request extensions. Handlers only read it.

use crate::{
    store::UserId,
    token::{Claims, TokenCodec},
    Error,
};
use serde::Serialize;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated user context derived from a verified bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
        }
    }
}

impl Principal {
    /// Resolve an `authorization` value (`Bearer <token>`) into a principal.
    ///
    /// Both transports go through here so the scheme and expiry rules are the
    /// same for HTTP headers and gRPC metadata.
    ///
    /// # Errors
    /// `Error::Unauthenticated` for a missing value, another scheme, or a token
    /// that fails verification.
    pub fn from_authorization(value: Option<&str>, tokens: &TokenCodec) -> Result<Self, Error> {
        let token = value
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .filter(|token| !token.is_empty() && !token.contains(char::is_whitespace))
            .ok_or(Error::Unauthenticated)?;

        Ok(tokens.verify(token)?.into())
    }
}
