// Build script for healersctl - embeds version at compile time

fn main() {
    // Release pipelines may pin the version through the environment
    let version = std::env::var("HEALERS_VERSION")
        .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=HEALERS_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=HEALERS_VERSION");
}
