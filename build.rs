fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/gnmi.proto");

    // Prefer a vendored protoc to avoid requiring a system installation.
    let protoc_path = protoc_bin_vendored::protoc_bin_path()
        .map_err(|e| format!("failed to locate vendored protoc: {e}"))?;
    std::env::set_var("PROTOC", protoc_path);

    // The loopback responder implements the server side, the harness drives the client side.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/gnmi.proto"], &["proto/"])?;
    Ok(())
}
