//! Error taxonomy shared by the services and both transports.
//!
//! Store and token failures convert into [`Error`] without changing category;
//! each transport maps the category onto its own status codes (see
//! `api::error` and `rpc::status`). Messages are stable and never include the
//! underlying cause, which is only logged.

use crate::{store::StoreError, token::TokenError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input. The message is safe to return to the caller.
    #[error("{0}")]
    Validation(String),

    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    Conflict,

    /// Unknown email and wrong password are deliberately the same variant.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or missing token")]
    Unauthenticated,

    #[error("internal error")]
    Internal(#[source] BoxError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(source: impl Into<BoxError>) -> Self {
        Self::Internal(source.into())
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict => Self::Conflict,
            StoreError::Unavailable(source) => Self::Internal(Box::new(source)),
        }
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::Expired => Self::Unauthenticated,
            other => Self::Internal(Box::new(other)),
        }
    }
}
