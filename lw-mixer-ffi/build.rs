//! Generates `lw_mixer.h` for C callers into OUT_DIR

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("LW_MIXER_H")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("lw_mixer.h"));
        }
        Err(err) => {
            println!("cargo:warning=lw_mixer.h not generated: {}", err);
        }
    }
}
