pub mod app;
pub mod core;
pub mod scanner;
pub mod store;

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Version string with build details for `--version`
pub fn long_version() -> String {
    format!(
        "{} (built {}, commit {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_TIME,
        GIT_HASH
    )
}
