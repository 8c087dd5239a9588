use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../memory.x");

    // Features reach build scripts as environment variables, not cfgs.
    if env::var_os("CARGO_FEATURE_HARDWARE").is_none() {
        return;
    }

    // The STM32H743 memory map goes next to the linker scripts that include it.
    let Some(out) = env::var_os("OUT_DIR").map(PathBuf::from) else {
        println!("cargo:warning=OUT_DIR not set; memory.x not staged");
        return;
    };
    if let Err(err) = fs::write(out.join("memory.x"), include_bytes!("../../memory.x")) {
        println!("cargo:warning=could not stage memory.x: {err}");
        return;
    }

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
