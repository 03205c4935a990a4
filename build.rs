use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rustc_is_nightly)");
    println!("cargo:rerun-if-env-changed=RUSTC");

    // Only the AVX-512 scanner needs unstable attributes, and only on toolchains
    // that still gate them.
    if env::var("CARGO_FEATURE_NIGHTLY_AVX").is_err() {
        return;
    }

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = match Command::new(&rustc).arg("--version").output() {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).into_owned(),
        _ => {
            println!("cargo:warning=could not query `{rustc} --version`; assuming stable");
            return;
        }
    };

    if version.contains("nightly") || version.contains("-dev") {
        println!("cargo:rustc-cfg=rustc_is_nightly");
    }
}
