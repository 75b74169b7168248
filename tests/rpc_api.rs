use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tonic::{transport::Channel, Code, Request};
use userhub::{
    rpc::{
        self,
        pb::{
            user_service_client::UserServiceClient, CreateUserRequest, DeleteUserRequest,
            GetAllUsersRequest, GetUserRequest, LoginRequest, RegisterRequest, UpdateUserRequest,
        },
    },
    store::MemoryStore,
    token::TokenCodec,
    AppState,
};

const SECRET: &str = "rpc-test-secret";

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    async fn start() -> Self {
        let tokens =
            Arc::new(TokenCodec::new(&SecretString::from(SECRET.to_string()), 24).unwrap());
        let state = AppState::new(Arc::new(MemoryStore::new()), tokens);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(rpc::serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    async fn client(&self) -> UserServiceClient<Channel> {
        UserServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
    }
}

fn with_token<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("authorization", format!("Bearer {token}").parse().unwrap());
    request
}

async fn register(client: &mut UserServiceClient<Channel>, email: &str) -> String {
    client
        .register(RegisterRequest {
            name: "Admin".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            age: 30,
        })
        .await
        .unwrap()
        .into_inner()
        .token
}

#[tokio::test]
async fn register_then_call_protected_method() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let token = register(&mut client, "admin@example.com").await;

    let users = client
        .get_all_users(with_token(GetAllUsersRequest {}, &token))
        .await
        .unwrap()
        .into_inner()
        .users;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "admin@example.com");

    server.stop().await;
}

#[tokio::test]
async fn missing_or_foreign_token_is_unauthenticated() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    register(&mut client, "admin@example.com").await;

    let status = client
        .get_all_users(GetAllUsersRequest {})
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let foreign = TokenCodec::new(&SecretString::from("another-secret".to_string()), 24)
        .unwrap()
        .issue(1, "admin@example.com")
        .unwrap();
    let status = client
        .get_user(with_token(GetUserRequest { id: 1 }, &foreign))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let expired = TokenCodec::new(&SecretString::from(SECRET.to_string()), 24)
        .unwrap()
        .issue_at(1, "admin@example.com", Utc::now() - Duration::hours(25))
        .unwrap();
    let status = client
        .get_all_users(with_token(GetAllUsersRequest {}, &expired))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    server.stop().await;
}

#[tokio::test]
async fn login_is_public_and_failures_are_generic() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    register(&mut client, "admin@example.com").await;

    let response = client
        .login(LoginRequest {
            email: "admin@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!response.token.is_empty());
    assert_eq!(response.user.unwrap().email, "admin@example.com");

    let wrong = client
        .login(LoginRequest {
            email: "admin@example.com".to_string(),
            password: "wrong-password".to_string(),
        })
        .await
        .unwrap_err();
    let unknown = client
        .login(LoginRequest {
            email: "ghost@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(wrong.code(), Code::Unauthenticated);
    assert_eq!(unknown.code(), Code::Unauthenticated);
    assert_eq!(wrong.message(), unknown.message());

    server.stop().await;
}

#[tokio::test]
async fn user_crud_scenario() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    let token = register(&mut client, "admin@example.com").await;

    let created = client
        .create_user(with_token(
            CreateUserRequest {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                age: 25,
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(created.id > 0);
    assert_eq!(created.name, "Alice");
    assert_eq!(created.age, 25);

    let fetched = client
        .get_user(with_token(GetUserRequest { id: created.id }, &token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fetched, created);

    let updated = client
        .update_user(with_token(
            UpdateUserRequest {
                id: created.id,
                name: "Alice2".to_string(),
                email: String::new(),
                age: 30,
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(updated.name, "Alice2");
    assert_eq!(updated.age, 30);
    assert_eq!(updated.email, "alice@example.com");

    let deleted = client
        .delete_user(with_token(DeleteUserRequest { id: created.id }, &token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(deleted.message, "User deleted successfully");

    let status = client
        .get_user(with_token(GetUserRequest { id: created.id }, &token))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    server.stop().await;
}

#[tokio::test]
async fn status_codes_for_bad_input_and_conflicts() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    let token = register(&mut client, "admin@example.com").await;

    let status = client
        .create_user(with_token(
            CreateUserRequest {
                name: "Nobody".to_string(),
                email: String::new(),
                age: 20,
            },
            &token,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .get_user(with_token(GetUserRequest { id: 0 }, &token))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .create_user(with_token(
            CreateUserRequest {
                name: "Copy".to_string(),
                email: "admin@example.com".to_string(),
                age: 20,
            },
            &token,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);

    let status = client
        .register(RegisterRequest {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "secret123".to_string(),
            age: 30,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);

    server.stop().await;
}
