//! Map parsed CLI matches to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, server, storage};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if a value is missing or the configuration is refused by
/// [`Args::validate`].
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let http_port = matches
        .get_one::<u16>(server::ARG_HTTP_PORT)
        .copied()
        .unwrap_or(8080);
    let grpc_port = matches
        .get_one::<u16>(server::ARG_GRPC_PORT)
        .copied()
        .unwrap_or(50051);

    let environment = matches
        .get_one::<String>(server::ARG_ENV)
        .context("missing required argument: --env")?
        .parse()?;
    let driver = matches
        .get_one::<String>(storage::ARG_DB_DRIVER)
        .context("missing required argument: --db-driver")?
        .parse()?;
    let db_path = matches
        .get_one::<String>(storage::ARG_DB_PATH)
        .cloned()
        .context("missing required argument: --db-path")?;

    let jwt_secret = matches
        .get_one::<String>(auth::ARG_JWT_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;
    let jwt_expiry_hours = matches
        .get_one::<i64>(auth::ARG_JWT_EXPIRY_HOURS)
        .copied()
        .unwrap_or(24);

    let args = Args {
        http_port,
        grpc_port,
        environment,
        driver,
        db_path,
        jwt_secret,
        jwt_expiry_hours,
    };

    args.validate()?;

    Ok(Action::Server(args))
}
