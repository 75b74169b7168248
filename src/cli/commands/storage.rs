use clap::{Arg, Command};

pub const ARG_DB_DRIVER: &str = "db-driver";
pub const ARG_DB_PATH: &str = "db-path";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DB_DRIVER)
                .long(ARG_DB_DRIVER)
                .help("Storage backend")
                .long_help(
                    "Storage backend. `memory` keeps records in the process and loses them on exit.",
                )
                .env("DB_DRIVER")
                .default_value("sqlite")
                .value_parser(["sqlite", "memory"]),
        )
        .arg(
            Arg::new(ARG_DB_PATH)
                .long(ARG_DB_PATH)
                .help("SQLite database file, created if missing")
                .env("DB_PATH")
                .default_value("userhub.db"),
        )
}
