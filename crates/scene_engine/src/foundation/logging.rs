//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use crate::core::config::LoggingConfig;

/// Initialize the logging system from `RUST_LOG`
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    let _ = env_logger::try_init();
}

/// Initialize the logging system with the level from a logging config
///
/// `RUST_LOG` still wins when it is set, so a single module can be turned up
/// without editing the config file.
pub fn init_with_level(config: &LoggingConfig) {
    let env = env_logger::Env::default().default_filter_or(config.level.as_str());
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized, keeping existing configuration");
    }
}
