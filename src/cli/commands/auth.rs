use clap::{Arg, Command};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRY_HOURS: &str = "jwt-expiry-hours";

/// Placeholder signing secret. Accepted in development only.
pub const DEFAULT_JWT_SECRET: &str = "default-secret-key-change-in-production";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for bearer tokens")
                .env("JWT_SECRET")
                .hide_env_values(true)
                .default_value(DEFAULT_JWT_SECRET),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRY_HOURS)
                .long(ARG_JWT_EXPIRY_HOURS)
                .help("Token lifetime in hours")
                .env("JWT_EXPIRY_HOURS")
                .default_value("24")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
