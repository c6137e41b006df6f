//! Logging initialization

fn builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g. `RUST_LOG=gridcache=debug`
/// to see per-pass streaming summaries.
///
/// # Example
/// ```
/// gridcache::core::logging::init();
/// log::info!("Engine started");
/// ```
pub fn init() {
    builder().init();
}

/// Initialize logging unless a logger is already installed
///
/// Returns `false` if another logger was set first. Safe to call from tests.
pub fn try_init() -> bool {
    builder().is_test(cfg!(test)).try_init().is_ok()
}
