//! gRPC transport (`package user; service UserService`).
//!
//! Every call passes through [`AuthLayer`] before it is routed. `Register` and
//! `Login` are in [`PUBLIC_METHODS`]; all other methods need
//! `authorization: Bearer <token>` metadata. [`RecoverLayer`] turns a panicking
//! method into `Internal` for that call only.

use crate::AppState;
use anyhow::Result;
use std::future::Future;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{info, Level};

pub mod layer;
pub mod service;
pub mod status;

pub use layer::{AuthLayer, RecoverLayer, PUBLIC_METHODS};
pub use service::UserRpc;

#[allow(clippy::doc_markdown, clippy::derive_partial_eq_without_eq)]
pub mod pb {
    tonic::include_proto!("user");
}

use pb::user_service_server::UserServiceServer;

/// Serve `UserService` on `listener` until `shutdown` resolves.
///
/// # Errors
/// Returns an error if the transport fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("gRPC server listening on {}", listener.local_addr()?);

    let tokens = state.tokens.clone();

    Server::builder()
        .layer(TraceLayer::new_for_grpc().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .layer(AuthLayer::new(tokens))
        .layer(RecoverLayer)
        .add_service(UserServiceServer::new(UserRpc::new(state)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    info!("gRPC server stopped");

    Ok(())
}
