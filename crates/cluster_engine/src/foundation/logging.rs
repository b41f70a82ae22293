//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "cluster_engine=info";

/// Initialize the logging system
///
/// Honors `RUST_LOG`; otherwise the engine logs at `info`. Calling this more
/// than once is harmless.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Initialize logging with a fallback filter used when `RUST_LOG` is unset
pub fn init_with_filter(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
