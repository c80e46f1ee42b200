fn main() {
    // Emit a single cfg flag so the rest of the crate can write
    // `#[cfg(native_api)]` around everything that links against the OS.
    // The buffer/pool/handle core builds on every host.
    let is_windows = std::env::var("CARGO_CFG_WINDOWS").is_ok();

    if is_windows {
        println!("cargo:rustc-cfg=native_api");
    }
}
