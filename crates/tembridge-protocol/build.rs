// Uses protox (pure Rust protobuf compiler) to avoid requiring an external protoc binary
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/protocol.proto");

    let file_descriptors = protox::compile(["proto/protocol.proto"], ["proto"])?;
    prost_build::Config::new().compile_fds(file_descriptors)?;
    Ok(())
}
