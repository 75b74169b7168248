use clap::{Arg, Command};

pub const ARG_HTTP_PORT: &str = "http-port";
pub const ARG_GRPC_PORT: &str = "grpc-port";
pub const ARG_ENV: &str = "env";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HTTP_PORT)
                .long(ARG_HTTP_PORT)
                .help("Port for the HTTP/JSON API")
                .env("HTTP_PORT")
                .default_value("8080")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_GRPC_PORT)
                .long(ARG_GRPC_PORT)
                .help("Port for the gRPC API")
                .env("GRPC_PORT")
                .default_value("50051")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ENV)
                .long(ARG_ENV)
                .help("Deployment environment, production refuses the placeholder JWT secret")
                .env("ENV")
                .default_value("development")
                .value_parser(["development", "production"]),
        )
}
