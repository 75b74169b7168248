use crate::{AppState, Error, Principal};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Reject requests without a valid bearer token; otherwise attach the
/// [`Principal`] for the handler.
///
/// # Errors
/// `Error::Unauthenticated`, rendered as 401 before the handler runs.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Error> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let principal = Principal::from_authorization(authorization, &state.tokens).inspect_err(|_| {
        debug!(path = %request.uri().path(), "rejected unauthenticated request");
    })?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
