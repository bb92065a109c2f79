#[cfg(feature = "bin")]
fn main() {
    let build_date = chrono::Utc::now().format("%Y-%m-%d");
    let version = env!("CARGO_PKG_VERSION");
    println!("cargo:rustc-env=FULL_VERSION={version} ({build_date})");
    println!("cargo:rerun-if-changed=build.rs");
}

#[cfg(not(feature = "bin"))]
fn main() {}
