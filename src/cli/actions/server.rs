use crate::{
    api,
    cli::commands::auth::DEFAULT_JWT_SECRET,
    rpc,
    store::{CredentialStore, MemoryStore, SqliteStore},
    token::TokenCodec,
    AppState,
};
use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => bail!("unknown environment: {other}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreDriver {
    Sqlite,
    Memory,
}

impl FromStr for StoreDriver {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown storage driver: {other}"),
        }
    }
}

impl fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub http_port: u16,
    pub grpc_port: u16,
    pub environment: Environment,
    pub driver: StoreDriver,
    pub db_path: String,
    pub jwt_secret: SecretString,
    pub jwt_expiry_hours: i64,
}

impl Args {
    /// Reject configurations that must never start.
    ///
    /// # Errors
    /// Returns an error in production when the JWT secret is the placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.environment == Environment::Production && self.uses_default_secret() {
            bail!("JWT_SECRET must be set to a non-default value in production");
        }
        Ok(())
    }

    fn uses_default_secret(&self) -> bool {
        self.jwt_secret.expose_secret() == DEFAULT_JWT_SECRET
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened, a port cannot be bound, or
/// either server fails.
pub async fn execute(args: Args) -> Result<()> {
    args.validate()?;

    if args.uses_default_secret() {
        warn!("using the default JWT secret, set JWT_SECRET before deploying");
    }

    let store: Arc<dyn CredentialStore> = match args.driver {
        StoreDriver::Sqlite => Arc::new(
            SqliteStore::connect(&args.db_path)
                .await
                .with_context(|| format!("Failed to open database {}", args.db_path))?,
        ),
        StoreDriver::Memory => {
            warn!("using the in-memory store, records are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let tokens = Arc::new(
        TokenCodec::new(&args.jwt_secret, args.jwt_expiry_hours)
            .context("Invalid token configuration")?,
    );

    let state = AppState::new(store, tokens);

    let http_listener = TcpListener::bind(format!("::0:{}", args.http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.http_port))?;
    let grpc_listener = TcpListener::bind(format!("::0:{}", args.grpc_port))
        .await
        .with_context(|| format!("Failed to bind gRPC port {}", args.grpc_port))?;

    info!(
        "userhub {} ({}) starting, storage: {}",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_COMMIT_HASH,
        args.driver
    );
    info!(
        "HTTP :{} public: POST /auth/register, POST /auth/login, GET /health",
        args.http_port
    );
    info!(
        "HTTP :{} bearer: POST /users, GET /users, GET /users/:id, PUT /users/:id, DELETE /users/:id",
        args.http_port
    );
    info!(
        "gRPC :{} user.UserService, public: Register, Login",
        args.grpc_port
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Gracefully shutdown");
        let _ = shutdown_tx.send(());
    });

    tokio::try_join!(
        api::serve(http_listener, state.clone(), wait(shutdown_rx.clone())),
        rpc::serve(grpc_listener, state, wait(shutdown_rx)),
    )?;

    Ok(())
}

async fn wait(mut shutdown: watch::Receiver<()>) {
    let _ = shutdown.changed().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
