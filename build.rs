//! Embeds the sanitizer guest module.
//!
//! The module is taken from `$OTS_WASM_PATH` when set, otherwise from
//! `assets/ots.wasm`. Without either the crate still builds, but the embedded
//! module is empty and compiling it reports `SanitizerError::ModuleLoad`.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=OTS_WASM_PATH");
    println!("cargo:rerun-if-changed=assets/ots.wasm");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target = out_dir.join("ots.wasm");

    let source = env::var_os("OTS_WASM_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/ots.wasm"));

    if source.is_file() {
        fs::copy(&source, &target).expect("failed to copy sanitizer module");
    } else {
        println!(
            "cargo:warning=sanitizer module not found at {}, embedding an empty module",
            source.display()
        );
        fs::write(&target, b"").expect("failed to write placeholder module");
    }
}
