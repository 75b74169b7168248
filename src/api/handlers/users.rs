//! Protected user endpoints.
//!
//! Every handler here runs behind `require_bearer`, so a [`Principal`] is
//! always present in the request extensions.

use crate::{
    api::error::ErrorBody,
    store::UserId,
    users::{UserChanges, UserView},
    AppState, Error, Principal, Result,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub age: i32,
}

/// Absent, empty or zero fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn user_id(path: std::result::Result<Path<UserId>, PathRejection>) -> Result<UserId> {
    let Path(id) = path?;
    if id <= 0 {
        return Err(Error::validation("invalid user id"));
    }
    Ok(id)
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all, fields(principal = principal.user_id))]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserView>)> {
    let Json(request) = payload?;

    let user = state
        .users
        .create(&request.name, &request.email, request.age)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All live users", body = [UserView]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserView>>> {
    debug!(principal = principal.user_id, "listing users");

    Ok(Json(state.users.list_all().await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    path: std::result::Result<Path<UserId>, PathRejection>,
) -> Result<Json<UserView>> {
    let id = user_id(path)?;

    Ok(Json(state.users.get_by_id(id).await?))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserView),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all, fields(principal = principal.user_id))]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: std::result::Result<Path<UserId>, PathRejection>,
    payload: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserView>> {
    let id = user_id(path)?;
    let Json(request) = payload?;

    if request.age.is_some_and(|age| age < 0) {
        return Err(Error::validation("age must be greater than 0"));
    }

    let user = state
        .users
        .update(
            id,
            UserChanges {
                name: request.name,
                email: request.email,
                age: request.age,
            },
        )
        .await?;

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all, fields(principal = principal.user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: std::result::Result<Path<UserId>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let id = user_id(path)?;

    state.users.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
