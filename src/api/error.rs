use crate::Error;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            message: None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid input".to_string(),
                    message: Some(message),
                },
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("User not found")),
            Self::Conflict => (
                StatusCode::CONFLICT,
                ErrorBody::new("Email already registered"),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("Invalid email or password"),
            ),
            Self::Unauthenticated => {
                let mut response =
                    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response();
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            Self::Internal(source) => {
                error!("request failed: {source}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        debug!("rejected request body: {rejection}");
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        debug!("rejected path: {rejection}");
        Self::validation("invalid user id")
    }
}
