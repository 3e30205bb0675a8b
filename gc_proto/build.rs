use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protoc_path = protoc_bin_vendored::protoc_bin_path()?;
    std::env::set_var("PROTOC", protoc_path);

    let proto_dir = PathBuf::from("proto");
    let protos = [proto_dir.join("ssl_gc.proto"), proto_dir.join("sim.proto")];
    for proto in &protos {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    prost_build::Config::new()
        .btree_map(["."])
        .compile_protos(&protos, &[proto_dir])?;

    Ok(())
}
