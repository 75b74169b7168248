use crate::{
    auth::{Authenticator, PasswordAuthenticator},
    store::CredentialStore,
    token::TokenCodec,
    users::UserService,
};
use std::sync::Arc;

/// Services shared by the HTTP router and the gRPC service.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub auth: Arc<dyn Authenticator>,
    pub tokens: Arc<TokenCodec>,
}

impl AppState {
    /// Wire the production services over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenCodec>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            auth: Arc::new(PasswordAuthenticator::new(store, tokens.clone())),
            tokens,
        }
    }
}
