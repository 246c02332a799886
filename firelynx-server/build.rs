fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::configure().compile_protos(
        &[
            "proto/firelynx/settings/v1/settings.proto",
            "proto/firelynx/control/v1/control.proto",
        ],
        &["proto"],
    )?;

    println!("cargo:rerun-if-changed=proto");

    Ok(())
}
