//! # Userhub
//!
//! `userhub` serves user records over two transports that share one set of
//! business services:
//!
//! - **HTTP/JSON** (`axum`), see [`api`].
//! - **gRPC** (`tonic`), see [`rpc`].
//!
//! ## Authentication
//!
//! Clients obtain an HS256-signed JWT from `register` or `login` and present it
//! as `Authorization: Bearer <token>` (HTTP header or gRPC metadata). Each
//! transport verifies it in its own middleware layer before any protected
//! handler runs, and hands the verified [`Principal`] to the handler through
//! request extensions. Tokens are not revocable; they stay valid until they
//! expire.
//!
//! ## Storage
//!
//! Records live behind the [`store::CredentialStore`] trait. The production
//! implementation is SQLite; an in-memory store backs the tests. Only an
//! Argon2id hash of a password is ever stored, and it never leaves the
//! process.

pub mod api;
pub mod auth;
pub mod cli;
pub mod context;
pub mod error;
pub mod rpc;
pub mod state;
pub mod store;
pub mod token;
pub mod users;

pub use context::Principal;
pub use error::{Error, Result};
pub use state::AppState;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
