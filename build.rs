fn main() {
    #[cfg(feature = "c_api")]
    {
        // Find out whether we're in debug or release mode.
        let out_dir = std::env::var("OUT_DIR").expect("No OUT_DIR env variable");
        let profile = std::env::var("PROFILE").expect("No PROFILE env variable");
        let target_dir = std::path::Path::new("target").join(profile);

        run_cbindgen();
        generate_pkg_config(&out_dir, &target_dir);

        println!("cargo:rerun-if-changed=cbindgen.toml");
        println!("cargo:rerun-if-changed=src");
    }
}

/// Writes the C header to target/include/libtypec-rs.h.
#[cfg(feature = "c_api")]
fn run_cbindgen() {
    let crate_dir =
        std::env::var("CARGO_MANIFEST_DIR").expect("No CARGO_MANIFEST_DIR env variable");
    let include_dir = std::path::Path::new(&crate_dir).join("target").join("include");
    std::fs::create_dir_all(&include_dir).expect("Failed to create the include directory");

    let config = cbindgen::Config::from_file("cbindgen.toml").expect("No cbindgen.toml file");
    cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
        .expect("Unable to generate bindings")
        .write_to_file(include_dir.join("libtypec-rs.h"));
}

#[cfg(feature = "c_api")]
fn generate_pkg_config(out_dir: &str, target_dir: &std::path::Path) {
    use std::io::Write;

    let dest_path = std::path::Path::new(out_dir).join("libtypec_rs.pc");
    let mut f = std::fs::File::create(&dest_path).expect("Failed to create libtypec_rs.pc");

    let version = std::env::var("CARGO_PKG_VERSION").expect("No CARGO_PKG_VERSION env variable");
    let description =
        std::env::var("CARGO_PKG_DESCRIPTION").expect("No CARGO_PKG_DESCRIPTION env variable");

    write!(
        f,
        "prefix=/usr\n\
         exec_prefix=${{prefix}}\n\
         libdir=${{exec_prefix}}/lib\n\
         includedir=${{prefix}}/include\n\
         \n\
         Name: libtypec_rs\n\
         Description: {description}\n\
         Version: {version}\n\
         Libs: -L${{libdir}} -ltypec_rs\n\
         Cflags: -I${{includedir}}\n"
    )
    .expect("Failed to write libtypec_rs.pc");

    // Make sure the target directory exists. It is created by Cargo
    // automatically during the build process, but it may not exist at this
    // point in time.
    if !target_dir.exists() {
        std::fs::create_dir_all(target_dir).expect("Failed to create target directory");
    }

    std::fs::copy(&dest_path, target_dir.join("libtypec_rs.pc"))
        .expect("Copying libtypec_rs.pc into the target directory failed");
}
