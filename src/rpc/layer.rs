//! Tower layers wrapped around the tonic router.
//!
//! They work on raw `http` requests rather than through a tonic interceptor
//! because the allowlist is keyed on the method path, which interceptors do
//! not see.

use crate::{token::TokenCodec, Principal};
use futures_util::FutureExt;
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tonic::{
    body::BoxBody,
    codegen::http::{header::AUTHORIZATION, Request, Response},
    Status,
};
use tower::{Layer, Service};
use tracing::{debug, error};

/// Methods callable without a token.
pub const PUBLIC_METHODS: [&str; 2] = ["/user.UserService/Login", "/user.UserService/Register"];

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

#[derive(Clone, Debug)]
pub struct AuthLayer {
    tokens: Arc<TokenCodec>,
}

impl AuthLayer {
    #[must_use]
    pub fn new(tokens: Arc<TokenCodec>) -> Self {
        Self { tokens }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthService<S> {
    inner: S,
    tokens: Arc<TokenCodec>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path();
        if !PUBLIC_METHODS.contains(&path) {
            let authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());

            match Principal::from_authorization(authorization, &self.tokens) {
                Ok(principal) => {
                    req.extensions_mut().insert(principal);
                }
                Err(err) => {
                    debug!(rpc.method = %req.uri().path(), "rejected unauthenticated call");
                    let response = Status::unauthenticated(err.to_string()).into_http();
                    return Box::pin(async move { Ok(response) });
                }
            }
        }

        Box::pin(inner.call(req))
    }
}

/// Converts a panic inside a method into an `Internal` status for that call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecoverLayer;

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverService { inner }
    }
}

#[derive(Clone, Debug)]
pub struct RecoverService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RecoverService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let method = req.uri().path().to_string();

        Box::pin(async move {
            match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    error!(rpc.method = %method, "method panicked: {}", panic_message(&*panic));
                    Ok(Status::internal("internal error").into_http())
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::convert::Infallible;
    use tonic::{body::empty_body, Code};
    use tower::{service_fn, ServiceExt};

    fn tokens(secret: &str) -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&SecretString::from(secret.to_string()), 1).unwrap())
    }

    // Echoes the authenticated user id back in a header so tests can see what
    // reached the method.
    async fn echo(req: Request<()>) -> Result<Response<BoxBody>, Infallible> {
        let mut response = Response::new(empty_body());
        if let Some(principal) = req.extensions().get::<Principal>() {
            response
                .headers_mut()
                .insert("x-user-id", principal.user_id.into());
        }
        Ok(response)
    }

    fn call(path: &str, authorization: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri(format!("http://localhost{path}"));
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    fn grpc_code(response: &Response<BoxBody>) -> Option<Code> {
        response
            .headers()
            .get("grpc-status")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i32>().ok())
            .map(Code::from)
    }

    #[tokio::test]
    async fn public_methods_need_no_token() {
        let service = AuthLayer::new(tokens("rpc-secret")).layer(service_fn(echo));

        for path in PUBLIC_METHODS {
            let response = service.clone().oneshot(call(path, None)).await.unwrap();
            assert_eq!(grpc_code(&response), None, "{path}");
            assert!(response.headers().get("x-user-id").is_none());
        }
    }

    #[tokio::test]
    async fn protected_methods_reject_missing_or_foreign_tokens() {
        let service = AuthLayer::new(tokens("rpc-secret")).layer(service_fn(echo));
        let foreign = tokens("other-secret").issue(1, "a@example.com").unwrap();
        let foreign = format!("Bearer {foreign}");

        for authorization in [None, Some("Bearer garbage"), Some(foreign.as_str())] {
            let response = service
                .clone()
                .oneshot(call("/user.UserService/GetAllUsers", authorization))
                .await
                .unwrap();
            assert_eq!(grpc_code(&response), Some(Code::Unauthenticated));
            assert!(response.headers().get("x-user-id").is_none());
        }
    }

    #[tokio::test]
    async fn valid_token_reaches_the_method_with_a_principal() {
        let tokens = tokens("rpc-secret");
        let token = tokens.issue(7, "seven@example.com").unwrap();
        let service = AuthLayer::new(tokens).layer(service_fn(echo));

        let response = service
            .oneshot(call(
                "/user.UserService/GetUser",
                Some(&format!("Bearer {token}")),
            ))
            .await
            .unwrap();

        assert_eq!(grpc_code(&response), None);
        assert_eq!(response.headers().get("x-user-id").unwrap(), "7");
    }

    #[tokio::test]
    async fn panicking_method_becomes_internal() {
        let service = RecoverLayer.layer(service_fn(|req: Request<()>| async move {
            if req.uri().path().ends_with("Boom") {
                panic!("boom");
            }
            Ok::<_, Infallible>(Response::new(empty_body()))
        }));

        let response = service
            .clone()
            .oneshot(call("/user.UserService/Boom", None))
            .await
            .unwrap();
        assert_eq!(grpc_code(&response), Some(Code::Internal));

        let response = service
            .oneshot(call("/user.UserService/GetUser", None))
            .await
            .unwrap();
        assert_eq!(grpc_code(&response), None);
    }
}
