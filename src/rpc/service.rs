use super::pb::{
    user_service_server::UserService, AuthResponse, CreateUserRequest, DeleteUserRequest,
    DeleteUserResponse, GetAllUsersRequest, GetAllUsersResponse, GetUserRequest, LoginRequest,
    RegisterRequest, UpdateUserRequest, UserMessage,
};
use crate::{
    auth::{AuthSession, Registration},
    users::{UserChanges, UserView},
    AppState, Principal,
};
use secrecy::SecretString;
use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

impl From<UserView> for UserMessage {
    fn from(user: UserView) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
        }
    }
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: Some(session.user.into()),
        }
    }
}

/// `UserService` over the shared application services.
#[derive(Clone)]
pub struct UserRpc {
    state: AppState,
}

impl UserRpc {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

// Set by `AuthLayer`; absent only if the service is mounted without it.
fn principal<T>(request: &Request<T>) -> Result<Principal, Status> {
    request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| Status::unauthenticated("invalid or missing token"))
}

fn require_id(id: i64) -> Result<i64, Status> {
    if id <= 0 {
        return Err(Status::invalid_argument("id is required"));
    }
    Ok(id)
}

fn optional(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[tonic::async_trait]
impl UserService for UserRpc {
    #[instrument(skip_all)]
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<UserMessage>, Status> {
        let principal = principal(&request)?;
        let request = request.into_inner();

        if request.name.is_empty() || request.email.is_empty() || request.age <= 0 {
            return Err(Status::invalid_argument("name, email and age are required"));
        }

        debug!(principal = principal.user_id, "creating user");

        let user = self
            .state
            .users
            .create(&request.name, &request.email, request.age)
            .await?;

        Ok(Response::new(user.into()))
    }

    async fn get_all_users(
        &self,
        request: Request<GetAllUsersRequest>,
    ) -> Result<Response<GetAllUsersResponse>, Status> {
        principal(&request)?;

        let users = self.state.users.list_all().await?;

        Ok(Response::new(GetAllUsersResponse {
            users: users.into_iter().map(UserMessage::from).collect(),
        }))
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserMessage>, Status> {
        principal(&request)?;
        let id = require_id(request.into_inner().id)?;

        let user = self.state.users.get_by_id(id).await?;

        Ok(Response::new(user.into()))
    }

    #[instrument(skip_all)]
    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UserMessage>, Status> {
        let principal = principal(&request)?;
        let request = request.into_inner();
        let id = require_id(request.id)?;

        if request.age < 0 {
            return Err(Status::invalid_argument("age must be greater than 0"));
        }

        debug!(principal = principal.user_id, user.id = id, "updating user");

        let user = self
            .state
            .users
            .update(
                id,
                UserChanges {
                    name: optional(request.name),
                    email: optional(request.email),
                    age: (request.age > 0).then_some(request.age),
                },
            )
            .await?;

        Ok(Response::new(user.into()))
    }

    #[instrument(skip_all)]
    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        let principal = principal(&request)?;
        let id = require_id(request.into_inner().id)?;

        debug!(principal = principal.user_id, user.id = id, "deleting user");

        self.state.users.delete(id).await?;

        Ok(Response::new(DeleteUserResponse {
            message: "User deleted successfully".to_string(),
        }))
    }

    #[instrument(skip_all)]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<AuthResponse>, Status> {
        let request = request.into_inner();

        if request.name.is_empty()
            || request.email.is_empty()
            || request.password.is_empty()
            || request.age <= 0
        {
            return Err(Status::invalid_argument(
                "name, email, password and age are required",
            ));
        }

        let session = self
            .state
            .auth
            .register(Registration {
                name: request.name,
                email: request.email,
                password: SecretString::from(request.password),
                age: request.age,
            })
            .await?;

        Ok(Response::new(session.into()))
    }

    #[instrument(skip_all)]
    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<AuthResponse>, Status> {
        let request = request.into_inner();

        if request.email.is_empty() || request.password.is_empty() {
            return Err(Status::invalid_argument("email and password are required"));
        }

        let session = self
            .state
            .auth
            .login(&request.email, &SecretString::from(request.password))
            .await?;

        Ok(Response::new(session.into()))
    }
}
