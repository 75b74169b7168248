use std::{env, error::Error};

fn main() -> Result<(), Box<dyn Error>> {
    built::write_built_file()?;

    // Fall back to the vendored compiler when the host has no protoc installed.
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/user.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/user.proto");

    Ok(())
}
