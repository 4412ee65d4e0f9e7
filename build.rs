//! Embeds a local build counter and the compile time into the binary.

use std::fs;
use std::path::Path;

const COUNTER_FILE: &str = "build_number.txt";

fn next_build_number(counter: &Path) -> u64 {
    let previous: u64 = fs::read_to_string(counter)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    previous + 1
}

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=data");

    let counter = Path::new(COUNTER_FILE);
    let build = next_build_number(counter);
    if let Err(e) = fs::write(counter, build.to_string()) {
        println!("cargo:warning=could not update {}: {}", COUNTER_FILE, e);
    }

    let compiled_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=NUTRISCAN_BUILD_NUMBER={}", build);
    println!("cargo:rustc-env=NUTRISCAN_BUILD_TIMESTAMP={}", compiled_at);
}
